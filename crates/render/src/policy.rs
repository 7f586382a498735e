use crate::errors::{Error, Errors, Stage};
use models::{Document, DocumentKey, LayeringPolicy};

/// LayerOrder is the resolved total ordering of layer names, most abstract
/// first. An empty order means the revision carries no layering policy and
/// every document is a root.
#[derive(Debug, Default, Clone)]
pub struct LayerOrder(Vec<String>);

impl LayerOrder {
    /// Resolve the revision's unique LayeringPolicy. Multiple policies are
    /// a fatal revision error, as is the absence of a policy while any
    /// document declares a layer.
    pub fn resolve(
        policies: &[(DocumentKey, LayeringPolicy)],
        documents: &[&Document],
        errors: &mut Errors,
    ) -> LayerOrder {
        match policies {
            [] => {
                if let Some(doc) = documents.iter().find(|d| d.layer().is_some()) {
                    Error::LayeringPolicyNotFound {
                        layer: doc.layer().unwrap_or_default().to_string(),
                    }
                    .push(Some(&doc.key()), Stage::Policy, errors);
                }
                LayerOrder::default()
            }
            [(_, policy)] => LayerOrder(policy.layer_order.clone()),
            multiple => {
                Error::MultipleLayeringPolicies {
                    count: multiple.len(),
                }
                .push(Some(&multiple[0].0), Stage::Policy, errors);
                LayerOrder::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn index_of(&self, layer: &str) -> Option<usize> {
        self.0.iter().position(|l| l == layer)
    }

    /// The layer immediately preceding `layer` in the order, or None if
    /// `layer` is the first (most abstract) layer or is not in the order.
    pub fn parent_layer_of(&self, layer: &str) -> Option<&str> {
        match self.index_of(layer)? {
            0 => None,
            index => Some(&self.0[index - 1]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parent_layer_of() {
        let order = LayerOrder(vec![
            "global".to_string(),
            "region".to_string(),
            "site".to_string(),
        ]);

        assert_eq!(order.parent_layer_of("global"), None);
        assert_eq!(order.parent_layer_of("region"), Some("global"));
        assert_eq!(order.parent_layer_of("site"), Some("region"));
        assert_eq!(order.parent_layer_of("unknown"), None);
        assert_eq!(order.index_of("site"), Some(2));
    }
}
