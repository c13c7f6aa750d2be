//! Which handler gets a request: exact paths first, then the first
//! path segment (`wo`, `wa`, ...).

use std::{any::type_name, collections::HashMap, fmt::Debug};

use anyhow::{Result, bail};
use itertools::Itertools;
use kstring::KString;

use crate::context::Context;
use crate::response::Response;


pub trait Handler: Debug + Send + Sync {
    /// Returning Ok(None) means, the handler is refusing to handle
    /// the request; it is answered with 404 unless there's another
    /// handler picking it up. Err means, the handler has accepted to
    /// handle the request but failed to, and is answered with an
    /// internal server error.
    fn call(&self, context: &mut Context<'_>) -> Result<Option<Response>>;
}


/// A Handler running a closure.
pub struct FnHandler<F>
where F: Fn(&mut Context<'_>) -> Result<Option<Response>> + Send + Sync
{
    handler: F
}

impl<F> FnHandler<F>
where F: Fn(&mut Context<'_>) -> Result<Option<Response>> + Send + Sync
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> Handler for FnHandler<F>
where F: Fn(&mut Context<'_>) -> Result<Option<Response>> + Send + Sync
{
    fn call(&self, context: &mut Context<'_>) -> Result<Option<Response>> {
        (self.handler)(context)
    }
}

impl<F> Debug for FnHandler<F>
where F: Fn(&mut Context<'_>) -> Result<Option<Response>> + Send + Sync
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("FnHandler({})",
                                 type_name::<F>()))
    }
}


/// `/a//b/` and `a/b` both become `/a/b`.
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.split('/').filter(|s| !s.is_empty()).join("/"))
}

#[derive(Debug, Default)]
pub struct Router {
    exact: HashMap<KString, Box<dyn Handler>>,
    by_key: HashMap<KString, Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for exactly `path`; using chaining.
    pub fn add(&mut self, path: &str, handler: impl Handler + 'static) -> Result<&mut Self> {
        let key = KString::from_string(normalize_path(path));
        if let Some(old) = self.exact.get(&key) {
            bail!("already contained an entry for {path:?}: {old:?}")
        }
        self.exact.insert(key, Box::new(handler));
        Ok(self)
    }

    /// Handler for all paths whose first segment is `key`.
    pub fn add_handler_key(&mut self, key: &str, handler: impl Handler + 'static)
                           -> Result<&mut Self> {
        let key = KString::from_ref(key);
        if let Some(old) = self.by_key.get(&key) {
            bail!("already contained a handler for key {key:?}: {old:?}")
        }
        self.by_key.insert(key, Box::new(handler));
        Ok(self)
    }

    pub fn get(&self, path_segments: &[KString]) -> Option<&dyn Handler> {
        let path = format!("/{}", path_segments.iter().join("/"));
        if let Some(h) = self.exact.get(path.as_str()) {
            return Some(&**h)
        }
        let key = path_segments.first()?;
        self.by_key.get(key.as_str()).map(|h| &**h)
    }

    /// Ok(None) if no handler is found or the handler declined.
    pub fn handle(&self, context: &mut Context<'_>) -> Result<Option<Response>> {
        match self.get(context.request().path_segments()) {
            Some(handler) => handler.call(context),
            None => Ok(None),
        }
    }
}
