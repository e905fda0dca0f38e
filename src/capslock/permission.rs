//! Accessibility trust checks
//!
//! A global event tap only delivers keyboard events once the process is
//! trusted for Accessibility. The detector asks through the [`Permission`]
//! trait so the polling logic does not depend on the OS.

#[cfg(target_os = "macos")]
pub use macos::SystemPermission;
#[cfg(not(target_os = "macos"))]
pub use unrestricted::SystemPermission;

/// Source of the privileged-input-capture entitlement
pub trait Permission {
    /// Whether the process may install a global event tap right now
    fn is_granted(&self) -> bool;

    /// Ask the OS to show its consent prompt. Fire-and-forget.
    fn request_with_prompt(&self);
}

#[cfg(target_os = "macos")]
mod macos {
    use core_foundation::base::TCFType;
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
    use core_foundation::string::CFString;
    use tracing::info;

    use super::Permission;

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXIsProcessTrusted() -> bool;
        fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
    }

    /// Accessibility trust as reported by ApplicationServices
    #[derive(Debug, Default)]
    pub struct SystemPermission;

    impl SystemPermission {
        pub fn new() -> Self {
            Self
        }
    }

    impl Permission for SystemPermission {
        fn is_granted(&self) -> bool {
            unsafe { AXIsProcessTrusted() }
        }

        fn request_with_prompt(&self) {
            let key = CFString::new("AXTrustedCheckOptionPrompt");
            let value = CFBoolean::true_value();
            let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);

            let trusted = unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) };
            info!(trusted, "requested Accessibility permission");
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod unrestricted {
    use super::Permission;

    /// Platforms without an Accessibility gate
    #[derive(Debug, Default)]
    pub struct SystemPermission;

    impl SystemPermission {
        pub fn new() -> Self {
            Self
        }
    }

    impl Permission for SystemPermission {
        fn is_granted(&self) -> bool {
            true
        }

        fn request_with_prompt(&self) {}
    }
}
