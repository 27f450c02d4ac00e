//! Tool chain: the ordered set of tools run on every record.
//!
//! Tools run in registration order. The chain is assembled before the
//! engine is initialized and handed to it explicitly.

use crate::tool::{Tool, ToolSlot, ToolStatus};

/// Errors from building a tool chain.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("a tool named '{0}' is already registered")]
    Duplicate(String),

    #[error("no tool named '{0}'")]
    NotFound(String),
}

/// Ordered collection of tool slots.
#[derive(Debug, Default)]
pub struct ToolChain {
    slots: Vec<ToolSlot>,
}

impl ToolChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tool. Returns its slot so the caller can adjust its status.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<&mut ToolSlot, ChainError> {
        self.register_boxed(Box::new(tool))
    }

    /// Append an already boxed tool.
    pub fn register_boxed(&mut self, tool: Box<dyn Tool>) -> Result<&mut ToolSlot, ChainError> {
        if self.get(tool.name()).is_some() {
            return Err(ChainError::Duplicate(tool.name().to_string()));
        }
        self.slots.push(ToolSlot::new(tool));
        let last = self.slots.len() - 1;
        Ok(&mut self.slots[last])
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: impl Tool + 'static) -> Result<Self, ChainError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ToolSlot> {
        self.slots.iter().find(|slot| slot.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ToolSlot> {
        self.slots.iter_mut().find(|slot| slot.name() == name)
    }

    /// Enable or disable a tool by name.
    pub fn set_status(&mut self, name: &str, status: ToolStatus) -> Result<(), ChainError> {
        self.get_mut(name)
            .ok_or_else(|| ChainError::NotFound(name.to_string()))?
            .set_status(status);
        Ok(())
    }

    /// Remove a tool, returning its slot.
    pub fn remove(&mut self, name: &str) -> Option<ToolSlot> {
        let index = self.slots.iter().position(|slot| slot.name() == name)?;
        Some(self.slots.remove(index))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of enabled tools.
    pub fn enabled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_enabled()).count()
    }

    /// Tool names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(ToolSlot::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSlot> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ToolSlot> {
        self.slots.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolError, ToolScope};

    struct Named(&'static str);

    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn execute(&mut self, _scope: &mut ToolScope<'_>) -> Result<(), ToolError> {
            Ok(())
        }
    }

    #[test]
    fn test_registration_order_is_kept() {
        let chain = ToolChain::new()
            .with(Named("c"))
            .and_then(|c| c.with(Named("a")))
            .and_then(|c| c.with(Named("b")))
            .unwrap();
        assert_eq!(chain.names(), vec!["c", "a", "b"]);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut chain = ToolChain::new();
        chain.register(Named("a")).unwrap();
        let err = chain.register(Named("a")).unwrap_err();
        assert_eq!(err.to_string(), "a tool named 'a' is already registered");
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_disable_on_registration() {
        let mut chain = ToolChain::new();
        chain.register(Named("a")).unwrap();
        chain
            .register(Named("b"))
            .unwrap()
            .set_status(ToolStatus::Disable);
        assert_eq!(chain.enabled(), 1);
        assert!(!chain.get("b").unwrap().is_enabled());
    }

    #[test]
    fn test_set_status_by_name() {
        let mut chain = ToolChain::new();
        chain.register(Named("a")).unwrap();
        chain.set_status("a", ToolStatus::Disable).unwrap();
        assert_eq!(chain.enabled(), 0);
        assert!(matches!(
            chain.set_status("zz", ToolStatus::Enable),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut chain = ToolChain::new();
        chain.register(Named("a")).unwrap();
        chain.register(Named("b")).unwrap();
        let slot = chain.remove("a").unwrap();
        assert_eq!(slot.name(), "a");
        assert_eq!(chain.names(), vec!["b"]);
        assert!(chain.remove("a").is_none());
        assert!(!chain.is_empty());
    }
}
