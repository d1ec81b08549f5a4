//! Editor machines shared by the integration tests.
//!
//! `EditorMachine` saves components to an in-memory store and, from inside
//! its `SAVE` action, tells `../PreviewMachine` and `../HealthMachine` about
//! it. Only the routing matters here; rendering and persistence are faked.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tomekit::builder::{MachineBuilder, TransitionBuilder};
use tomekit::machine::{Event, Machine, RouteContext};
use tomekit::queue::TransitionError;
use tomekit::router::{MachineRouter, RoutedMachine};
use tomekit::state_enum;
use tomekit::tome::{TomeBase, TomeBuilder};

pub const TOME: &str = "EditorTome";
pub const EDITOR: &str = "EditorMachine";
pub const PREVIEW: &str = "PreviewMachine";
pub const HEALTH: &str = "HealthMachine";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub content: String,
}

pub fn component(id: &str, content: &str) -> Component {
    Component {
        id: id.to_string(),
        name: format!("{id}.tsx"),
        content: content.to_string(),
    }
}

/// Stand-in for the storage collaborator that owns component bytes.
#[derive(Clone, Default)]
pub struct ComponentStore {
    saved: Arc<Mutex<HashMap<String, Component>>>,
    offline: Arc<AtomicBool>,
}

impl ComponentStore {
    pub async fn save(&self, component: &Component) -> Result<(), TransitionError> {
        tokio::task::yield_now().await;
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransitionError::failed("storage offline"));
        }
        self.saved
            .lock()
            .insert(component.id.clone(), component.clone());
        Ok(())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<Component> {
        self.saved.lock().get(id).cloned()
    }
}

state_enum! {
    pub enum EditorState {
        Idle,
        Editing,
        Saving,
        Error,
    }
    error: [Error]
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorContext {
    pub component: Option<Component>,
    pub is_dirty: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

async fn save_component(
    store: ComponentStore,
    mut context: EditorContext,
    route: RouteContext,
) -> Result<EditorContext, TransitionError> {
    let component = context
        .component
        .clone()
        .ok_or_else(|| TransitionError::failed("No component to save"))?;
    store.save(&component).await?;

    route.send(
        &format!("../{PREVIEW}"),
        "COMPONENT_SAVED",
        json!({ "component": component }),
    );
    route.send(
        &format!("../{HEALTH}"),
        "OPERATION_COMPLETE",
        json!({ "operation": "save", "componentId": component.id }),
    );

    context.is_dirty = false;
    context.last_saved = Some(Utc::now());
    context.error = None;
    Ok(context)
}

pub fn editor_machine(router: &MachineRouter, store: ComponentStore) -> Arc<Machine<EditorState, EditorContext>> {
    let definition = MachineBuilder::new(EDITOR)
        .initial(EditorState::Idle)
        .context(EditorContext::default())
        .transitions([
            TransitionBuilder::new()
                .from(EditorState::Idle)
                .on("LOAD")
                .to(EditorState::Editing)
                .update(|c: &mut EditorContext, e: &Event| {
                    c.component = e.payload_as().ok();
                    c.is_dirty = false;
                }),
            TransitionBuilder::new()
                .from(EditorState::Editing)
                .on("EDIT")
                .to(EditorState::Editing)
                .update(|c: &mut EditorContext, e: &Event| {
                    if let (Some(component), Some(content)) =
                        (c.component.as_mut(), e.payload["content"].as_str())
                    {
                        component.content = content.to_string();
                        c.is_dirty = true;
                    }
                }),
            TransitionBuilder::new()
                .from(EditorState::Editing)
                .on("SAVE")
                .to(EditorState::Saving)
                .action(move |c: EditorContext, _e, route| save_component(store.clone(), c, route))
                .then(EditorState::Editing),
            TransitionBuilder::new()
                .from(EditorState::Error)
                .on("RESET")
                .to(EditorState::Editing),
        ])
        .map(|b| {
            b.error_state(EditorState::Error, |c: &mut EditorContext, e: &str| {
                c.error = Some(e.to_string())
            })
        })
        .and_then(|b| b.build())
        .expect("editor definition is valid");
    Arc::new(Machine::new(definition, router.clone()))
}

state_enum! {
    pub enum PreviewState {
        Idle,
        Ready,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewContext {
    pub component: Option<Component>,
    pub render_count: u32,
}

fn show_saved(c: &mut PreviewContext, e: &Event) {
    c.component = serde_json::from_value(e.payload["component"].clone()).ok();
    c.render_count += 1;
}

pub fn preview_machine(router: &MachineRouter) -> Arc<Machine<PreviewState, PreviewContext>> {
    let definition = MachineBuilder::new(PREVIEW)
        .initial(PreviewState::Idle)
        .context(PreviewContext::default())
        .transitions([
            TransitionBuilder::new()
                .from(PreviewState::Idle)
                .on("COMPONENT_SAVED")
                .to(PreviewState::Ready)
                .update(show_saved),
            TransitionBuilder::new()
                .from(PreviewState::Ready)
                .on("COMPONENT_SAVED")
                .to(PreviewState::Ready)
                .update(show_saved),
        ])
        .and_then(|b| b.build())
        .expect("preview definition is valid");
    Arc::new(Machine::new(definition, router.clone()))
}

state_enum! {
    pub enum HealthState {
        Idle,
        Monitoring,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthContext {
    pub request_count: u32,
    pub save_count: u32,
    pub last_operation: Option<String>,
}

pub fn health_machine(router: &MachineRouter) -> Arc<Machine<HealthState, HealthContext>> {
    let definition = MachineBuilder::new(HEALTH)
        .initial(HealthState::Idle)
        .context(HealthContext::default())
        .transitions([
            TransitionBuilder::new()
                .from(HealthState::Idle)
                .on("START_MONITORING")
                .to(HealthState::Monitoring),
            TransitionBuilder::new()
                .from(HealthState::Monitoring)
                .on("OPERATION_COMPLETE")
                .to(HealthState::Monitoring)
                .update(|c: &mut HealthContext, e: &Event| {
                    let operation = e.payload["operation"].as_str().map(str::to_string);
                    c.request_count += 1;
                    if operation.as_deref() == Some("save") {
                        c.save_count += 1;
                    }
                    c.last_operation = operation;
                }),
        ])
        .and_then(|b| b.build())
        .expect("health definition is valid");
    Arc::new(Machine::new(definition, router.clone()))
}

/// The editor tome: editor, preview and health machines sharing one router.
pub fn editor_tome(router: MachineRouter, store: ComponentStore) -> TomeBase {
    TomeBuilder::new(TOME)
        .router(router)
        .child(EDITOR, move |router| -> Arc<dyn RoutedMachine> {
            editor_machine(router, store.clone())
        })
        .child(PREVIEW, |router| -> Arc<dyn RoutedMachine> { preview_machine(router) })
        .child(HEALTH, |router| -> Arc<dyn RoutedMachine> { health_machine(router) })
        .startup_event(HEALTH, Event::new("START_MONITORING"))
        .build()
        .expect("editor tome declaration is valid")
}

/// An initialized editor tome with one component loaded and edited.
pub async fn editing_session(store: ComponentStore) -> TomeBase {
    let tome = editor_tome(MachineRouter::new(), store);
    tome.initialize().expect("tome initializes");
    tome.send(EDITOR, "LOAD", json!(component("button", "<button/>")))
        .expect("editor accepts LOAD");
    tome.send(EDITOR, "EDIT", json!({ "content": "<button>Save</button>" }))
        .expect("editor accepts EDIT");
    tome.settled().await;
    tome
}

pub fn context_of<T: for<'de> Deserialize<'de>>(tome: &TomeBase, machine: &str) -> T {
    let value: Value = tome
        .get_machine_context(machine)
        .unwrap_or_else(|| panic!("{machine} is not running"));
    serde_json::from_value(value).expect("context deserializes")
}
