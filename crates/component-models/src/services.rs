//! Data-service models

use crate::ports::Port;
use std::sync::Arc;

/// An interface-only model: a set of ports plus a semantic type
///
/// Data services are fulfilled by component models that provide them. A
/// service may extend other services; `fulfills` follows the `extends`
/// relation transitively.
#[derive(Debug)]
pub struct DataServiceModel {
    /// Unique service name
    pub name: String,
    /// Services this one extends
    pub extends: Vec<Arc<DataServiceModel>>,
    /// Abstract ports promised to fulfilling components
    pub ports: Vec<Port>,
    /// Root services are framework markers, too general to drive default
    /// selection
    pub root: bool,
}

impl DataServiceModel {
    /// Create a new service model with no parents and no ports
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Vec::new(),
            ports: Vec::new(),
            root: false,
        }
    }

    /// Mark this service as a root marker
    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Add a parent service
    pub fn with_extends(mut self, parent: Arc<DataServiceModel>) -> Self {
        self.extends.push(parent);
        self
    }

    /// Add a port to the service interface
    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    /// Whether this service fulfills `other`, following `extends` transitively
    pub fn fulfills(&self, other: &DataServiceModel) -> bool {
        if self.name == other.name {
            return true;
        }
        self.extends.iter().any(|parent| parent.fulfills(other))
    }

    /// All services fulfilled by this one, self first
    pub fn each_fulfilled_service(self: &Arc<Self>) -> Vec<Arc<DataServiceModel>> {
        let mut result = vec![Arc::clone(self)];
        for parent in &self.extends {
            for service in parent.each_fulfilled_service() {
                if !result.iter().any(|s| s.name == service.name) {
                    result.push(service);
                }
            }
        }
        result
    }

    /// Find a port by name
    pub fn find_port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }
}

// Model identity is the registered name.
impl PartialEq for DataServiceModel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DataServiceModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfills_is_reflexive() {
        let service = DataServiceModel::new("image_source");
        assert!(service.fulfills(&service));
    }

    #[test]
    fn test_fulfills_follows_extends() {
        let base = Arc::new(DataServiceModel::new("device"));
        let camera = Arc::new(DataServiceModel::new("camera").with_extends(Arc::clone(&base)));
        let stereo = Arc::new(DataServiceModel::new("stereo_camera").with_extends(Arc::clone(&camera)));

        assert!(stereo.fulfills(&camera));
        assert!(stereo.fulfills(&base));
        assert!(!base.fulfills(&camera));
    }

    #[test]
    fn test_each_fulfilled_service_deduplicates() {
        let base = Arc::new(DataServiceModel::new("device"));
        let left = Arc::new(DataServiceModel::new("left").with_extends(Arc::clone(&base)));
        let right = Arc::new(DataServiceModel::new("right").with_extends(Arc::clone(&base)));
        let diamond = Arc::new(
            DataServiceModel::new("diamond")
                .with_extends(Arc::clone(&left))
                .with_extends(Arc::clone(&right)),
        );

        let fulfilled = diamond.each_fulfilled_service();
        let names: Vec<_> = fulfilled.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["diamond", "left", "device", "right"]);
    }
}
