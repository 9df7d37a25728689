use crate::hooks::DEFAULT_HOOK_ATTRIBUTE;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What conversion does with a hook marker naming a hook that is not registered.
///
/// Either way the element is converted as a plain element without the marker, and the problem is
/// reported through [`crate::Converter::reports`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum UnknownHookPolicy {
    /// Remove the marker attribute from the external node itself.
    #[default]
    StripMarker,
    /// Leave the external tree untouched and let the caller decide.
    Report,
}

/// Per-binding settings.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct BindingConfig {
    /// Attribute whose value names the hook an element is handed to.
    pub hook_attribute: String,
    pub unknown_hook: UnknownHookPolicy,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            hook_attribute: DEFAULT_HOOK_ATTRIBUTE.to_string(),
            unknown_hook: UnknownHookPolicy::default(),
        }
    }
}

impl BindingConfig {
    pub fn with_hook_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.hook_attribute = attribute.into();
        self
    }

    pub fn with_unknown_hook(mut self, policy: UnknownHookPolicy) -> Self {
        self.unknown_hook = policy;
        self
    }
}
