//! Direct actions: named entry points reachable without a cached
//! page, `/wa/<name>`; `/` runs `default`.

use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::{Result, bail};
use itertools::Itertools;
use kstring::KString;

use crate::component::ActionResult;
use crate::context::Context;
use crate::response::Response;
use crate::router::Handler;
use crate::debug;


pub const DIRECT_ACTION_REQUEST_HANDLER_KEY: &str = "wa";
pub const DEFAULT_ACTION_NAME: &str = "default";

pub type DirectAction = Arc<dyn Fn(&mut Context<'_>) -> Result<ActionResult> + Send + Sync>;

#[derive(Default)]
pub struct DirectActions {
    actions: HashMap<KString, DirectAction>,
}

impl fmt::Debug for DirectActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectActions({})", self.actions.keys().sorted().join(", "))
    }
}

impl DirectActions {
    pub fn insert(&mut self, name: &str, action: DirectAction) -> Result<()> {
        let key = KString::from_ref(name);
        if self.actions.contains_key(&key) {
            bail!("already contained a direct action named {name:?}")
        }
        self.actions.insert(key, action);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DirectAction> {
        self.actions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(|k| k.as_str())
    }
}


/// The action name addressed by `segments`, None if the path is not
/// one of ours.
fn action_name(segments: &[KString]) -> Option<&str> {
    match segments {
        [] => Some(DEFAULT_ACTION_NAME),
        [key] if key.as_str() == DIRECT_ACTION_REQUEST_HANDLER_KEY => Some(DEFAULT_ACTION_NAME),
        [key, name] if key.as_str() == DIRECT_ACTION_REQUEST_HANDLER_KEY => Some(name.as_str()),
        _ => None,
    }
}

/// A page is rendered under a fresh context id and cached.
pub fn respond_with_action_result(result: ActionResult, context: &mut Context<'_>)
                                  -> Result<Response> {
    match result {
        ActionResult::None => bail!("direct action returned no result"),
        ActionResult::Page(mut page) => {
            page.awake();
            let context_id = context.context_id();
            let response = page.generate_response(context)?;
            debug!("saving page {:?} as context {context_id}", page.name());
            context.session().save_page(context_id, page.into_page_ref());
            Ok(response)
        }
        ActionResult::Other(r) => r.generate_response(),
    }
}

#[derive(Debug)]
pub struct DirectActionRequestHandler;

impl Handler for DirectActionRequestHandler {
    fn call(&self, context: &mut Context<'_>) -> Result<Option<Response>> {
        let Some(name) = action_name(context.request().path_segments()) else {
            return Ok(None)
        };
        let Some(action) = context.application().direct_action(name) else {
            debug!("no direct action named {name:?}");
            return Ok(None)
        };
        debug!("direct action {name:?}");
        let result = action(context)?;
        match respond_with_action_result(result, context) {
            Ok(r) => Ok(Some(r)),
            Err(e) => bail!("direct action {name:?}: {e:#}"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_action_name() {
        let segs = |s: &[&'static str]| -> Vec<KString> {
            s.iter().map(|s| KString::from_static(s)).collect()
        };
        assert_eq!(action_name(&segs(&[])), Some("default"));
        assert_eq!(action_name(&segs(&["wa"])), Some("default"));
        assert_eq!(action_name(&segs(&["wa", "login"])), Some("login"));
        assert_eq!(action_name(&segs(&["wa", "a", "b"])), None);
        assert_eq!(action_name(&segs(&["wo", "a"])), None);
    }

    #[test]
    fn t_debug() -> Result<()> {
        let mut actions = DirectActions::default();
        actions.insert("b", Arc::new(|_: &mut Context<'_>| Ok(ActionResult::None)))?;
        actions.insert("a", Arc::new(|_: &mut Context<'_>| Ok(ActionResult::None)))?;
        assert!(actions.insert("a", Arc::new(|_: &mut Context<'_>| Ok(ActionResult::None)))
                .is_err());
        assert_eq!(format!("{actions:?}"), "DirectActions(a, b)");
        assert_eq!(actions.names().count(), 2);
        Ok(())
    }
}
