//! A small guest book: a counter, a form adding names to a list, and
//! a second page. Configured via the `NG_*` env vars, see
//! `AppConfig::from_env`.

use std::sync::Arc;

use anyhow::{Result, bail};
use ngobjects::application::Application;
use ngobjects::component::{ActionResult, Component, ComponentDefinition};
use ngobjects::config::AppConfig;
use ngobjects::context::Context;
use ngobjects::rouille_runner::RouilleRunner;
use ngobjects::value::Value;
use ngobjects::warn::set_debug;
use ngobjects::{info, warn};


const MAIN_TEMPLATE: &str = r#"<html><head><title>Guest book</title></head>
<body>
<h1>Guest book</h1>
<p>Visits on this page: <webobject name="Count"/>
 (<webobject name="Increment">one more</webobject>)</p>
<webobject name="Form">
 Your name: <wo:TextField value="$name"/>
 <webobject name="Sign"/>
</webobject>
<webobject name="HasGuests">
 <ul><webobject name="Guests"><li><webobject name="Guest"/>
  (#<wo:String value="$position"/>)</li></webobject></ul>
</webobject>
<webobject name="NoGuests"><p>Nobody signed yet.</p></webobject>
<p><webobject name="Frame">The guest book has <webobject name="Total"/> entries.</webobject></p>
<p><webobject name="ToAbout">About</webobject> | <webobject name="Restart">start over</webobject></p>
</body></html>
"#;

const MAIN_DECLARATIONS: &str = r#"
Count : WOString { value = count; }
Increment : WOHyperlink { action = increment; }
Form : WOForm {}
Sign : WOSubmitButton { action = sign; value = "Sign"; }
HasGuests : WOConditional { condition = guests; }
NoGuests : WOConditional { condition = guests; negate = true; }
Guests : WORepetition { list = guests; item = guest; index = index; }
Guest : WOString { value = ~capitalize(guest); valueWhenEmpty = "(anonymous)"; }
Frame : Panel { title = "Summary"; }
Total : WOString { value = ~length(guests); }
ToAbout : WOHyperlink { action = about; }
Restart : WOHyperlink { directActionName = "default"; }
"#;

#[derive(Debug, Default)]
struct Main {
    count: i64,
    name: String,
    guests: Vec<String>,
    guest: Value,
    index: i64,
}

impl Component for Main {
    fn value_for_key(&self, key: &str) -> Option<Value> {
        match key {
            "count" => Some(self.count.into()),
            "name" => Some(self.name.clone().into()),
            "guests" => Some(self.guests.clone().into()),
            "guest" => Some(self.guest.clone()),
            "index" => Some(self.index.into()),
            "position" => Some((self.index + 1).into()),
            _ => None,
        }
    }

    fn take_value_for_key(&mut self, key: &str, value: Value) -> Result<()> {
        match (key, value) {
            ("name", v) => self.name = v.to_display_string(),
            ("guest", v) => self.guest = v,
            ("index", Value::Int(i)) => self.index = i,
            (key, value) => bail!("Main: can't set {key:?} to {value:?}"),
        }
        Ok(())
    }

    fn perform_action(&mut self, name: &str, application: &Application)
                      -> Result<ActionResult> {
        match name {
            "increment" => {
                self.count += 1;
                Ok(ActionResult::None)
            }
            "sign" => {
                let name = std::mem::take(&mut self.name);
                self.guests.push(name.trim().to_string());
                Ok(ActionResult::None)
            }
            "about" => Ok(application.page_with_name("About")?.into()),
            _ => bail!("Main: unknown action {name:?}"),
        }
    }
}


/// Wraps its content in a titled box.
#[derive(Debug, Default)]
struct Panel {
    title: String,
}

impl Component for Panel {
    fn value_for_key(&self, key: &str) -> Option<Value> {
        match key {
            "title" => Some(self.title.clone().into()),
            _ => None,
        }
    }

    fn take_value_for_key(&mut self, key: &str, value: Value) -> Result<()> {
        match key {
            "title" => self.title = value.to_display_string(),
            _ => bail!("Panel: can't set {key:?}"),
        }
        Ok(())
    }
}


#[derive(Debug, Default)]
struct About;

impl Component for About {
    fn value_for_key(&self, _key: &str) -> Option<Value> {
        None
    }

    fn perform_action(&mut self, name: &str, application: &Application)
                      -> Result<ActionResult> {
        match name {
            "back" => Ok(application.page_with_name("Main")?.into()),
            _ => bail!("About: unknown action {name:?}"),
        }
    }
}


fn application(config: AppConfig) -> Result<Application> {
    let mut app = Application::new(config);
    app.register_component(ComponentDefinition::new(
        "Main", MAIN_TEMPLATE, MAIN_DECLARATIONS, || Box::new(Main::default())))?
        .register_component(ComponentDefinition::new(
            "Panel",
            "<div class=\"box\"><h2><wo:String value=\"$title\"/></h2>\
             <webobject name=\"Content\"/></div>",
            "Content : ComponentContent {}",
            || Box::new(Panel::default())))?
        .register_component(ComponentDefinition::new(
            "About",
            "<html><body><p>Pages are kept on the server, links address \
             the elements on them.</p><p><webobject name=\"Back\">back</webobject></p>\
             </body></html>",
            "Back : Hyperlink { action = back; }",
            || Box::new(About)))?
        .register_direct_action("default", |context: &mut Context<'_>| {
            Ok(context.application().page_with_name("Main")?.into())
        })?;
    Ok(app)
}

fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    set_debug(config.debug);

    let app = application(config)?;
    let n = app.warm_up()?;
    info!("{n} components ready");

    let runner = RouilleRunner::new(app.config())?;
    let server = runner.run_server("ngdemo_server", Arc::new(app))?;
    if server.join().is_err() {
        warn!("server thread panicked");
    }
    Ok(())
}
