use rustc_hash::FxHashMap;

use crate::config::RoutingConfig;
use crate::error::ProxyError;

/// Pre-built endpoint resolver over the immutable routing tables.
///
/// Built once at startup and shared read-only across requests; tests can
/// construct it from an alternate `RoutingConfig`.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    image_capable: FxHashMap<String, Vec<String>>,
    text_only: FxHashMap<String, Vec<String>>,
    aliases: FxHashMap<String, String>,
}

impl EndpointResolver {
    #[must_use]
    pub fn new(routing: &RoutingConfig) -> Self {
        let build_table = |table: &FxHashMap<String, crate::config::ModelEndpoints>| -> FxHashMap<String, Vec<String>> {
            table
                .iter()
                .map(|(model, entry)| (model.clone(), entry.endpoints.clone()))
                .collect()
        };
        Self {
            image_capable: build_table(&routing.image_support),
            text_only: build_table(&routing.no_image_support),
            aliases: routing.model_aliases.clone(),
        }
    }

    /// Resolve the ordered list of upstream base URLs for a request.
    ///
    /// Resolution order:
    /// 1. Substitute the canonical model name when an alias entry exists.
    /// 2. Look up the capability table selected by `has_images`.
    /// 3. Fall back to the opposite table, so a text-only request for an
    ///    image-tagged model (and vice versa) still resolves.
    ///
    /// The returned slice order is the failover priority order.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::NoRoute` when the canonical model has no
    /// endpoints in either table.
    pub fn resolve(&self, model: &str, has_images: bool) -> Result<&[String], ProxyError> {
        let canonical = self
            .aliases
            .get(model)
            .map_or(model, String::as_str);

        let (primary, fallback) = if has_images {
            (&self.image_capable, &self.text_only)
        } else {
            (&self.text_only, &self.image_capable)
        };

        for table in [primary, fallback] {
            if let Some(endpoints) = table.get(canonical) {
                if !endpoints.is_empty() {
                    return Ok(endpoints);
                }
            }
        }

        Err(ProxyError::NoRoute {
            model: canonical.to_string(),
            has_images,
        })
    }
}
