//! `<source>` payloads: float and name arrays with their accessors.

use roxmltree::Node;

use super::xml;
use crate::cache::{BlobCache, BlobKey};
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

/// Immutable flat array of floats read from `<float_array>`.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatArray {
    pub id: Name,

    /// Values per element that carry data (accessor params).
    pub n_components: usize,

    /// Values per element in `data`, including skipped params.
    pub stride: usize,

    /// Total number of floats; always `data.len()`.
    pub count: usize,

    pub data: Vec<f32>,
}

impl FloatArray {
    /// Build from text, consulting the blob cache first.
    ///
    /// The cache key is `(id, count, parent)`; a hit skips text parsing.
    pub fn parse(
        id: Name,
        text: &str,
        count: usize,
        n_components: usize,
        stride: usize,
        cache: &BlobCache,
        parent: &str,
    ) -> ColladaResult<Self> {
        if id.is_empty() {
            return Err(invalid(&id, "missing id"));
        }
        if count == 0 {
            return Err(invalid(&id, "zero count"));
        }
        if stride == 0 || n_components == 0 || n_components > stride {
            return Err(invalid(
                &id,
                format!("bad accessor layout (components {n_components}, stride {stride})"),
            ));
        }

        if count % stride != 0 {
            return Err(invalid(
                &id,
                format!("count {count} is not a whole number of stride-{stride} elements"),
            ));
        }

        let count_str = count.to_string();
        let key = BlobKey::new(&[id.as_str(), count_str.as_str(), parent]);

        if let Some(data) = cache.read_f32s(&key, count) {
            log::trace!("Blob hit for float array {}", id);
            return Ok(Self {
                id,
                n_components,
                stride,
                count,
                data,
            });
        }

        if text.trim().is_empty() {
            return Err(invalid(&id, "empty text"));
        }

        let data = xml::parse_floats(text)?;
        if data.len() != count {
            return Err(invalid(
                &id,
                format!("declared count {} but found {} values", count, data.len()),
            ));
        }

        if cache.is_enabled() {
            cache.write_f32s(&key, &data);
        }

        Ok(Self {
            id,
            n_components,
            stride,
            count,
            data,
        })
    }

    /// Number of accessor elements.
    pub fn element_count(&self) -> usize {
        self.count / self.stride
    }

    /// The data-carrying components of element `index`.
    pub fn element(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.stride)?;
        self.data.get(start..start + self.n_components)
    }

    /// Elements packed without stride padding.
    pub fn packed(&self) -> Vec<f32> {
        if self.stride == self.n_components {
            return self.data.clone();
        }
        self.data
            .chunks_exact(self.stride)
            .flat_map(|chunk| &chunk[..self.n_components])
            .copied()
            .collect()
    }

    pub fn first(&self) -> Option<f32> {
        self.data.first().copied()
    }

    pub fn last(&self) -> Option<f32> {
        self.data.last().copied()
    }
}

fn invalid(id: &Name, reason: impl Into<String>) -> ColladaError {
    ColladaError::InvalidArray {
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Array of names read from `<Name_array>`, e.g. interpolation types.
#[derive(Clone, Debug, PartialEq)]
pub struct NameArray {
    pub id: Name,
    pub names: Vec<Name>,
}

impl NameArray {
    pub fn parse(id: Name, text: &str, count: usize) -> ColladaResult<Self> {
        if id.is_empty() {
            return Err(invalid(&id, "missing id"));
        }
        if count == 0 {
            return Err(invalid(&id, "zero count"));
        }
        let names: Vec<Name> = text.split_whitespace().map(Name::new).collect();
        if names.len() != count {
            return Err(invalid(
                &id,
                format!("declared count {} but found {} names", count, names.len()),
            ));
        }
        Ok(Self { id, names })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceArray {
    Float(FloatArray),
    Name(NameArray),
}

/// A `<source>` element wrapping exactly one array.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    pub id: Name,
    pub array: SourceArray,
}

impl Source {
    /// Parse a `<source>`; `parent` is the owning geometry/animation id and
    /// only feeds the cache key.
    pub fn parse(node: Node<'_, '_>, cache: &BlobCache, parent: &str) -> ColladaResult<Self> {
        let id = xml::required_name_attr(&node, "id")?;

        let (n_components, stride) = match xml::child(node, "technique_common")
            .and_then(|t| xml::child(t, "accessor"))
        {
            Some(accessor) => {
                let stride = xml::parse_attr_or(&accessor, "stride", 1usize)?;
                // Params without a name mark skipped values.
                let mut params = xml::children(accessor, "param").peekable();
                let named = match params.peek() {
                    Some(_) => params.filter(|p| p.has_attribute("name")).count(),
                    None => 1,
                };
                (named.min(stride), stride)
            }
            None => (1, 1),
        };

        let array = if let Some(floats) = xml::child(node, "float_array") {
            let array_id = xml::name_attr(&floats, "id").unwrap_or_else(|| id.clone());
            let count = xml::parse_required_attr(&floats, "count")?;
            SourceArray::Float(FloatArray::parse(
                array_id,
                xml::text(&floats),
                count,
                n_components,
                stride,
                cache,
                parent,
            )?)
        } else if let Some(names) = xml::child(node, "Name_array") {
            let array_id = xml::name_attr(&names, "id").unwrap_or_else(|| id.clone());
            let count = xml::parse_required_attr(&names, "count")?;
            SourceArray::Name(NameArray::parse(array_id, xml::text(&names), count)?)
        } else {
            let element = xml::elements(node)
                .map(|n| xml::tag(&n).to_string())
                .find(|t| t.ends_with("_array"))
                .unwrap_or_else(|| "array".to_string());
            return Err(ColladaError::UnsupportedElement {
                parent: xml::describe(&node),
                element,
            });
        };

        Ok(Self { id, array })
    }

    pub fn floats(&self) -> Option<&FloatArray> {
        match &self.array {
            SourceArray::Float(f) => Some(f),
            SourceArray::Name(_) => None,
        }
    }

    pub fn names(&self) -> Option<&NameArray> {
        match &self.array {
            SourceArray::Name(n) => Some(n),
            SourceArray::Float(_) => None,
        }
    }

    /// Float data or an `InvalidArray` error naming this source.
    pub fn require_floats(&self) -> ColladaResult<&FloatArray> {
        self.floats().ok_or_else(|| invalid(&self.id, "expected a float array"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::temp_cache;

    const POSITIONS: &str = r##"<source id="box-positions">
        <float_array id="box-positions-array" count="6">0 0 0 1 0.5 -2</float_array>
        <technique_common>
            <accessor source="#box-positions-array" count="2" stride="3">
                <param name="X" type="float"/>
                <param name="Y" type="float"/>
                <param name="Z" type="float"/>
            </accessor>
        </technique_common>
    </source>"##;

    fn parse_source(xml: &str, cache: &BlobCache) -> ColladaResult<Source> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Source::parse(doc.root_element(), cache, "box")
    }

    #[test]
    fn test_float_source_has_declared_count() {
        let source = parse_source(POSITIONS, &BlobCache::disabled()).unwrap();
        let floats = source.floats().unwrap();

        assert_eq!(floats.count, 6);
        assert_eq!(floats.data.len(), 6);
        assert_eq!(floats.n_components, 3);
        assert_eq!(floats.element_count(), 2);
        assert_eq!(floats.element(1), Some(&[1.0, 0.5, -2.0][..]));
        assert_eq!(floats.element(2), None);
    }

    #[test]
    fn test_count_mismatch_fails() {
        let xml = r#"<source id="s"><float_array id="a" count="4">1 2 3</float_array></source>"#;
        let err = parse_source(xml, &BlobCache::disabled()).unwrap_err();
        assert!(matches!(err, ColladaError::InvalidArray { .. }));
    }

    #[test]
    fn test_zero_count_and_empty_text_fail() {
        let zero = r#"<source id="s"><float_array id="a" count="0"></float_array></source>"#;
        assert!(parse_source(zero, &BlobCache::disabled()).is_err());

        let empty = r#"<source id="s"><float_array id="a" count="2"> </float_array></source>"#;
        assert!(parse_source(empty, &BlobCache::disabled()).is_err());
    }

    #[test]
    fn test_cache_round_trip_matches_text_parse() {
        let cache = temp_cache("source_round_trip");
        let first = parse_source(POSITIONS, &cache).unwrap();

        // The second parse must come from the blob: feed it text that would
        // fail to parse.
        let broken = POSITIONS.replace("0 0 0 1 0.5 -2", "x x x x x x");
        let second = parse_source(&broken, &cache).unwrap();

        let a = first.floats().unwrap();
        let b = second.floats().unwrap();
        let bits_a: Vec<u32> = a.data.iter().map(|f| f.to_bits()).collect();
        let bits_b: Vec<u32> = b.data.iter().map(|f| f.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_packed_skips_unnamed_stride() {
        let array = FloatArray {
            id: Name::new("uv"),
            n_components: 2,
            stride: 3,
            count: 6,
            data: vec![0.0, 1.0, 9.0, 0.5, 0.25, 9.0],
        };
        assert_eq!(array.packed(), vec![0.0, 1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_unnamed_params_are_skipped() {
        let xml = r##"<source id="uv">
            <float_array id="uv-array" count="6">0 1 9 0.5 0.25 9</float_array>
            <technique_common>
                <accessor source="#uv-array" count="2" stride="3">
                    <param name="S" type="float"/>
                    <param name="T" type="float"/>
                    <param type="float"/>
                </accessor>
            </technique_common>
        </source>"##;
        let source = parse_source(xml, &BlobCache::disabled()).unwrap();
        let floats = source.floats().unwrap();

        assert_eq!(floats.n_components, 2);
        assert_eq!(floats.element(1), Some(&[0.5, 0.25][..]));
        assert_eq!(floats.packed(), vec![0.0, 1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_partial_trailing_element_fails() {
        let xml = POSITIONS
            .replace(r#"count="6">0 0 0 1 0.5 -2"#, r#"count="5">0 0 0 1 0.5"#);
        assert!(matches!(
            parse_source(&xml, &BlobCache::disabled()),
            Err(ColladaError::InvalidArray { .. })
        ));
    }

    #[test]
    fn test_name_source() {
        let xml = r#"<source id="interp">
            <Name_array id="interp-array" count="2">LINEAR BEZIER</Name_array>
        </source>"#;
        let source = parse_source(xml, &BlobCache::disabled()).unwrap();
        let names = source.names().unwrap();
        assert_eq!(names.names, vec![Name::new("LINEAR"), Name::new("BEZIER")]);
        assert!(source.require_floats().is_err());
    }
}
