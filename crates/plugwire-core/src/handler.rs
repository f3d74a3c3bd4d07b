//! Transport handler registry
//!
//! Handlers are keyed by a numeric message id. Each route records the request
//! size it expects so the dispatcher can reject mismatched requests before the
//! handler ever sees them.

use crate::{PluginConfig, PluginContext, PluginError, PluginResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Marker for `#[repr(C)]` structs that travel as raw bytes
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain no pointers or references, have
/// no padding bytes (declare explicit reserved fields instead) and accept any
/// bit pattern of their fields as a valid value.
pub unsafe trait RawMessage: Copy + Send + 'static {
    /// Read a value from exactly `size_of::<Self>()` bytes
    fn read_from(bytes: &[u8]) -> PluginResult<Self> {
        let expected = std::mem::size_of::<Self>();
        if bytes.len() != expected {
            return Err(PluginError::Serialization(format!(
                "expected {expected} bytes, got {}",
                bytes.len()
            )));
        }
        // SAFETY: length checked above; read_unaligned tolerates any host alignment
        // and the trait contract makes every bit pattern valid.
        Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<Self>()) })
    }

    /// Copy the value out as bytes
    fn to_bytes(&self) -> Vec<u8> {
        // SAFETY: the trait contract rules out padding, so every byte is initialized.
        let bytes = unsafe {
            std::slice::from_raw_parts((self as *const Self).cast::<u8>(), std::mem::size_of::<Self>())
        };
        bytes.to_vec()
    }
}

/// Per-call view handed to a handler
pub struct RequestContext<'a> {
    message_id: u32,
    plugin: &'a PluginContext,
}

impl<'a> RequestContext<'a> {
    pub fn new(message_id: u32, plugin: &'a PluginContext) -> Self {
        Self { message_id, plugin }
    }

    pub fn message_id(&self) -> u32 {
        self.message_id
    }

    pub fn plugin(&self) -> &'a PluginContext {
        self.plugin
    }

    pub fn config(&self) -> &'a PluginConfig {
        self.plugin.config()
    }
}

/// Type-erased handler: request bytes in, response bytes out
pub type HandlerFn = Arc<dyn Fn(&RequestContext<'_>, &[u8]) -> PluginResult<Vec<u8>> + Send + Sync>;

/// A registered handler and its request layout
#[derive(Clone)]
pub struct Route {
    expected_size: Option<usize>,
    handler: HandlerFn,
}

impl Route {
    /// Request size this route accepts; `None` accepts any size
    pub fn expected_size(&self) -> Option<usize> {
        self.expected_size
    }

    /// Reject a request whose size does not match the registered layout
    pub fn check_size(&self, message_id: u32, actual: usize) -> PluginResult<()> {
        match self.expected_size {
            Some(expected) if expected != actual => Err(PluginError::Serialization(format!(
                "request size mismatch for id {message_id}: expected {expected} bytes, got {actual}"
            ))),
            _ => Ok(()),
        }
    }

    pub fn invoke(&self, ctx: &RequestContext<'_>, request: &[u8]) -> PluginResult<Vec<u8>> {
        (self.handler)(ctx, request)
    }
}

/// Message id to handler table, filled once during init
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    routes: HashMap<u32, Route>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a byte-level handler
    ///
    /// `expected_size` of `None` accepts requests of any size (including an
    /// absent request).
    pub fn register_raw<F>(
        &mut self,
        message_id: u32,
        expected_size: Option<usize>,
        handler: F,
    ) -> PluginResult<()>
    where
        F: Fn(&RequestContext<'_>, &[u8]) -> PluginResult<Vec<u8>> + Send + Sync + 'static,
    {
        if self.routes.contains_key(&message_id) {
            return Err(PluginError::Config(format!(
                "handler for id {message_id} registered twice"
            )));
        }
        self.routes.insert(
            message_id,
            Route {
                expected_size,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Register a handler over `#[repr(C)]` request and response structs
    ///
    /// The expected request size is `size_of::<Req>()`.
    pub fn register<Req, Resp, F>(&mut self, message_id: u32, handler: F) -> PluginResult<()>
    where
        Req: RawMessage,
        Resp: RawMessage,
        F: Fn(&RequestContext<'_>, &Req) -> PluginResult<Resp> + Send + Sync + 'static,
    {
        self.register_raw(
            message_id,
            Some(std::mem::size_of::<Req>()),
            move |ctx, bytes| {
                let request = Req::read_from(bytes)?;
                handler(ctx, &request).map(|response| response.to_bytes())
            },
        )
    }

    pub fn get(&self, message_id: u32) -> Option<&Route> {
        self.routes.get(&message_id)
    }

    /// Registered ids in ascending order
    pub fn message_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.routes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
