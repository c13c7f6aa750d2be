use std::sync::Arc;

use anyhow::{Result, bail};

use crate::binding::{Binding, KeyPath};
use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::element::{DynamicElement, Element};
use crate::elements::{evaluate, settable};
use crate::registry::ElementArgs;
use crate::response::Response;
use crate::value::Value;


/// Renders its content once per entry of `list`, with `item` and
/// `index` set on the component before each round. Each round gets
/// its own element id level.
#[derive(Debug)]
pub struct Repetition {
    list: Binding,
    item: Option<KeyPath>,
    index: Option<KeyPath>,
    content: Option<Arc<Element>>,
}

impl Repetition {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let list = args.required("list")?;
        let item = settable(args.take("item"), "item")?;
        let index = settable(args.take("index"), "index")?;
        let content = args.finish("Repetition");
        Ok(Box::new(Repetition { list, item, index, content }))
    }

    fn items(&self, context: &Context<'_>, components: &ComponentStack<'_>)
             -> Result<Vec<Value>> {
        match evaluate(&self.list, context, components)? {
            Value::Null => Ok(Vec::new()),
            Value::List(l) => Ok(l),
            other => bail!("Repetition: list binding {} gave a non-list value: {other}",
                           self.list),
        }
    }

    fn set_round(&self, i: usize, item: Value, components: &mut ComponentStack<'_>)
                 -> Result<()> {
        if let Some(path) = &self.item {
            path.set_value_in(components.component_mut(), item)?;
        }
        if let Some(path) = &self.index {
            path.set_value_in(components.component_mut(), Value::from(i))?;
        }
        Ok(())
    }

    /// Calls `f` on the content for each round, stopping early when it
    /// returns Some.
    fn each<R>(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>,
        mut f: impl FnMut(&Element, &mut Context<'_>, &mut ComponentStack<'_>)
                          -> Result<Option<R>>
    ) -> Result<Option<R>> {
        let content = match &self.content {
            Some(c) => c,
            None => return Ok(None),
        };
        let items = self.items(context, components)?;
        context.element_id_mut().push();
        let mut result = Ok(None);
        for (i, item) in items.into_iter().enumerate() {
            result = self.set_round(i, item, components)
                .and_then(|()| f(&**content, context, components));
            if !matches!(result, Ok(None)) {
                break
            }
            context.element_id_mut().increment();
        }
        context.element_id_mut().pop();
        result
    }
}

impl DynamicElement for Repetition {
    fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        self.each(context, components, |content, context, components| {
            content.take_values_from_request(context, components)?;
            Ok(None::<()>)
        })?;
        Ok(())
    }

    fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        self.each(context, components, |content, context, components| {
            if context.is_on_sender_path() {
                content.invoke_action(context, components)
            } else {
                Ok(None)
            }
        })
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        self.each(context, components, |content, context, components| {
            content.append_to_response(response, context, components)?;
            Ok(None::<()>)
        })?;
        Ok(())
    }
}
