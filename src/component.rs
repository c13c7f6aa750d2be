//! Stateful components: the user-written `Component` objects, their
//! definitions (template + declarations + constructor), and the
//! instance trees that are kept in the page cache.

use std::{any::type_name, collections::HashMap, fmt::{self, Debug},
          sync::{Arc, Mutex}};

use anyhow::{Result, anyhow, bail};
use kstring::KString;

use crate::application::Application;
use crate::context::Context;
use crate::element::Element;
use crate::registry::Registry;
use crate::response::{ActionResults, Response};
use crate::template_parser::{CompileError, compile_template};
use crate::value::Value;
use crate::debug;


/// The user-visible side of a component: its state is read and
/// written through keys by bindings, and actions are invoked by name.
pub trait Component: Debug + Send {
    fn value_for_key(&self, key: &str) -> Option<Value>;

    fn take_value_for_key(&mut self, key: &str, _value: Value) -> Result<()> {
        bail!("{} has no settable key {key:?}", type_name::<Self>())
    }

    fn perform_action(&mut self, name: &str, _application: &Application)
                      -> Result<ActionResult> {
        bail!("{} has no action {name:?}", type_name::<Self>())
    }

    /// Called when a page is about to be used for a new request.
    fn awake(&mut self) {}
}


/// What an action returns.
pub enum ActionResult {
    /// Stay on (and re-render) the current page.
    None,
    /// Continue with this page.
    Page(ComponentInstance),
    /// Let the result generate the response itself.
    Other(Box<dyn ActionResults>),
}

impl Debug for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionResult::None => f.write_str("ActionResult::None"),
            ActionResult::Page(p) => write!(f, "ActionResult::Page({})", p.name()),
            ActionResult::Other(r) => write!(f, "ActionResult::Other({r:?})"),
        }
    }
}

impl From<ComponentInstance> for ActionResult {
    fn from(page: ComponentInstance) -> Self {
        ActionResult::Page(page)
    }
}

impl From<Response> for ActionResult {
    fn from(response: Response) -> Self {
        ActionResult::Other(Box::new(response))
    }
}


pub type ComponentConstructor = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// A named component type. The template is compiled on first use
/// (or by `Application::warm_up`) and then shared.
pub struct ComponentDefinition {
    name: KString,
    template_source: String,
    declarations_source: String,
    constructor: ComponentConstructor,
    compiled: Mutex<Option<Arc<Element>>>,
}

impl Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Not descending into the template: definitions can refer to
        // themselves.
        write!(f, "ComponentDefinition({:?})", self.name)
    }
}

impl ComponentDefinition {
    pub fn new<F>(name: &str, template: &str, declarations: &str, constructor: F) -> Self
    where F: Fn() -> Box<dyn Component> + Send + Sync + 'static
    {
        ComponentDefinition {
            name: KString::from_ref(name),
            template_source: template.into(),
            declarations_source: declarations.into(),
            constructor: Arc::new(constructor),
            compiled: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instantiate(self: &Arc<Self>) -> ComponentInstance {
        ComponentInstance {
            definition: self.clone(),
            component: (self.constructor)(),
            children: HashMap::new(),
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// The compiled template. Failed compilations aren't cached, the
    /// next call tries again.
    pub fn template(&self, registry: &Registry) -> Result<Arc<Element>, CompileError> {
        // The cached value is only ever replaced as a whole, a poisoned
        // lock still holds a consistent Option.
        let mut compiled = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(element) = &*compiled {
            return Ok(element.clone())
        }
        debug!("compiling template of component {:?}", self.name);
        let element = compile_template(&self.template_source, &self.declarations_source,
                                       registry)
            .map_err(|e| CompileError::InComponent {
                component: self.name.to_string(),
                source: Box::new(e)
            })?;
        *compiled = Some(element.clone());
        Ok(element)
    }
}


/// A component object together with the instances of the
/// sub-components in its template, keyed by the element id of the
/// reference they were created for.
pub struct ComponentInstance {
    definition: Arc<ComponentDefinition>,
    component: Box<dyn Component>,
    children: HashMap<KString, ComponentInstance>,
}

impl Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.definition.name)
            .field("component", &self.component)
            .field("children", &self.children)
            .finish()
    }
}

/// A page as stored in the page cache.
pub type PageRef = Arc<Mutex<ComponentInstance>>;

impl ComponentInstance {
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<ComponentDefinition> {
        &self.definition
    }

    pub fn component(&self) -> &dyn Component {
        &*self.component
    }

    pub fn component_mut(&mut self) -> &mut dyn Component {
        &mut *self.component
    }

    pub fn child(&self, element_id: &str) -> Option<&ComponentInstance> {
        self.children.get(element_id)
    }

    pub fn children_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn take_child(&mut self, key: &str) -> Option<ComponentInstance> {
        self.children.remove(key)
    }

    pub(crate) fn insert_child(&mut self, key: KString, child: ComponentInstance) {
        self.children.insert(key, child);
    }

    pub fn value_for_key(&self, key: &str) -> Option<Value> {
        self.component.value_for_key(key)
    }

    /// Wakes up the whole tree, parents before children.
    pub fn awake(&mut self) {
        self.component.awake();
        for child in self.children.values_mut() {
            child.awake();
        }
    }

    pub fn into_page_ref(self) -> PageRef {
        Arc::new(Mutex::new(self))
    }

    fn template(&self, context: &Context) -> Result<Arc<Element>> {
        Ok(self.definition.template(context.registry())?)
    }

    /// Phase 1: let the elements read the submitted form values.
    pub fn take_values_from_request(&mut self, context: &mut Context) -> Result<()> {
        let template = self.template(context)?;
        context.reset_element_id();
        let mut components = ComponentStack::new(self);
        template.take_values_from_request(context, &mut components)
    }

    /// Phase 2: find the sender and run its action. None if no
    /// element took the action.
    pub fn invoke_action(&mut self, context: &mut Context) -> Result<Option<ActionResult>> {
        let template = self.template(context)?;
        context.reset_element_id();
        let mut components = ComponentStack::new(self);
        template.invoke_action(context, &mut components)
    }

    /// Phase 3: render.
    pub fn append_to_response(&mut self, response: &mut Response, context: &mut Context)
                              -> Result<()> {
        let template = self.template(context)?;
        context.reset_element_id();
        let mut components = ComponentStack::new(self);
        template.append_to_response(response, context, &mut components)
    }

    pub fn generate_response(&mut self, context: &mut Context) -> Result<Response> {
        let mut response = Response::default();
        response.set_header("Content-Type", "text/html; charset=utf-8");
        response.set_muted(!context.should_render());
        self.append_to_response(&mut response, context)?;
        response.set_muted(false);
        Ok(response)
    }
}


/// A sub-component taken out of its parent while its template is
/// being traversed.
pub struct Frame {
    pub(crate) key: KString,
    pub(crate) instance: ComponentInstance,
    /// The content between the reference's tags, rendered by
    /// `ComponentContent` in the parent's scope.
    pub(crate) content: Option<Arc<Element>>,
}

/// The chain of components from the page down to the one whose
/// template is currently being traversed.
pub struct ComponentStack<'p> {
    page: &'p mut ComponentInstance,
    nested: Vec<Frame>,
}

impl<'p> ComponentStack<'p> {
    pub fn new(page: &'p mut ComponentInstance) -> Self {
        ComponentStack { page, nested: Vec::new() }
    }

    pub fn current(&self) -> &ComponentInstance {
        match self.nested.last() {
            Some(frame) => &frame.instance,
            None => self.page,
        }
    }

    pub fn current_mut(&mut self) -> &mut ComponentInstance {
        match self.nested.last_mut() {
            Some(frame) => &mut frame.instance,
            None => self.page,
        }
    }

    pub fn component(&self) -> &dyn Component {
        self.current().component()
    }

    pub fn component_mut(&mut self) -> &mut dyn Component {
        self.current_mut().component_mut()
    }

    pub fn depth(&self) -> usize {
        self.nested.len()
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.nested.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Result<Frame> {
        self.nested.pop().ok_or_else(|| anyhow!("component stack underflow"))
    }

    /// Remove the innermost frame, so that the parent is current;
    /// None at page level. Must be handed back via `push`.
    pub(crate) fn suspend(&mut self) -> Option<Frame> {
        self.nested.pop()
    }
}
