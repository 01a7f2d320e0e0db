//! SessionBackend trait definition

/// Trait for the runtime that owns the SCORM data model.
///
/// Every call is synchronous and returns as soon as the runtime answers. The
/// runtime is assumed to be single-connection and non-reentrant; callers
/// serialise access.
pub trait SessionBackend: Send + Sync {
    /// Open the connection with the host runtime
    fn init(&self) -> bool;

    /// Read a data-model field. `None` when the field is absent or the
    /// connection is not open.
    fn get(&self, field: &str) -> Option<String>;

    /// Write a data-model field
    fn set(&self, field: &str, value: &str) -> bool;

    /// Ask the runtime to persist pending writes. The result is advisory.
    fn save(&self) -> bool;

    /// Close the connection with the host runtime
    fn quit(&self) -> bool;

    /// Read the completion status through the runtime's status shortcut
    fn get_status(&self) -> Option<String>;

    /// Write the completion status through the runtime's status shortcut
    fn set_status(&self, status: &str) -> bool;

    /// Protocol version the runtime is speaking
    fn version(&self) -> String;

    /// Select the protocol version. Read by `init`.
    fn set_version(&self, version: &str);

    /// Toggle the runtime's own diagnostic output
    fn set_debug(&self, _enabled: bool) {}
}
