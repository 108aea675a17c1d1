// Diagnostic channel
//
// Receives validation messages from the driver for the lifetime of the
// instance and forwards them to a `LogSink`. The driver may call in from its
// own threads, so the sink must be `Send + Sync`.

use super::driver::Backend;
use super::error::InitResult;
use crate::logging::{LogLevel, LogSink};
use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Message severity as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn from_flags(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Flags;

        if flags.contains(Flags::VERBOSE) {
            Severity::Verbose
        } else if flags.contains(Flags::INFO) {
            Severity::Info
        } else if flags.contains(Flags::WARNING) {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    pub fn level(self) -> LogLevel {
        match self {
            Severity::Verbose => LogLevel::Verbose,
            Severity::Info => LogLevel::Info,
            Severity::Warning => LogLevel::Warning,
            Severity::Error => LogLevel::Error,
        }
    }
}

/// Human-readable message categories, e.g. `"General | Validation"`.
pub fn categories(types: vk::DebugUtilsMessageTypeFlagsEXT) -> String {
    use vk::DebugUtilsMessageTypeFlagsEXT as Type;

    let names: Vec<&str> = [
        (Type::GENERAL, "General"),
        (Type::VALIDATION, "Validation"),
        (Type::PERFORMANCE, "Performance"),
    ]
    .into_iter()
    .filter_map(|(flag, name)| types.contains(flag).then_some(name))
    .collect();

    if names.is_empty() {
        "Unknown".to_string()
    } else {
        names.join(" | ")
    }
}

struct ChannelState {
    sink: Arc<dyn LogSink>,
}

/// Owns the state the driver callback reads through its user-data pointer.
///
/// The state is boxed so the pointer stays valid when the channel moves; the
/// channel must outlive every messenger created from it, including the one
/// chained into instance creation.
pub struct DiagnosticChannel {
    state: Box<ChannelState>,
}

impl DiagnosticChannel {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            state: Box::new(ChannelState { sink }),
        }
    }

    /// Messenger create-info routing every severity to this channel.
    pub fn create_info(&self) -> vk::DebugUtilsMessengerCreateInfoEXT {
        vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(diagnostic_callback))
            .user_data(self.user_data())
            .build()
    }

    fn user_data(&self) -> *mut c_void {
        &*self.state as *const ChannelState as *mut c_void
    }

    /// Register a messenger for this channel on the live instance.
    pub fn attach<B: Backend>(&self, backend: &mut B) -> InitResult<vk::DebugUtilsMessengerEXT> {
        let messenger = backend.create_messenger(self)?;
        log::debug!("Diagnostic channel attached");
        Ok(messenger)
    }

    pub fn detach<B: Backend>(&self, backend: &mut B, messenger: vk::DebugUtilsMessengerEXT) {
        backend.destroy_messenger(messenger);
        log::debug!("Diagnostic channel detached");
    }
}

impl ChannelState {
    /// Forward one driver message to the sink.
    fn dispatch(
        &self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        types: vk::DebugUtilsMessageTypeFlagsEXT,
        message: &str,
    ) {
        let level = Severity::from_flags(severity).level();
        self.sink.log(level, &format!("[{}] {}", categories(types), message));
    }
}

// Called by the driver, possibly from its own threads. Must not unwind.
unsafe extern "system" fn diagnostic_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_user_data.is_null() || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let state = &*(p_user_data as *const ChannelState);
        let p_message = (*p_callback_data).p_message;
        let message = if p_message.is_null() {
            Cow::Borrowed("")
        } else {
            CStr::from_ptr(p_message).to_string_lossy()
        };
        state.dispatch(message_severity, message_types, &message);
    }));

    if result.is_err() {
        let _ = panic::catch_unwind(|| log::error!("diagnostic sink panicked; message dropped"));
    }

    vk::FALSE
}
