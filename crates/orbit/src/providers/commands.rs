use super::{ChangeSink, InputOutcome, Provider};
use crate::config::{self, CommandItem, CommandsConfig, SETUP_COMMAND};
use crate::menu::node::META_CONTENT;
use crate::menu::{
    Action, ClickBehavior, ContentId, FunctionNode, GestureKind, IconRef, Modifiers, NodeType,
    ProviderId, TypingMode,
};
use orbitctl::icon::IconName;
use orbitctl::wm::{self, ShellCommand};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

const PROMPT_ID: &str = "prompt";
const HISTORY_LIMIT: usize = 20;

type Runner = Arc<dyn Fn(&ShellCommand) -> std::io::Result<()> + Send + Sync>;

/// Shell commands from the config, optionally grouped, plus a typed-command prompt.
pub struct CommandsProvider {
    id: ProviderId,
    name: String,
    nodes: Vec<FunctionNode>,
    prompt: bool,
    history: Mutex<Vec<String>>,
    sink: RwLock<Option<ChangeSink>>,
    runner: Runner,
}

impl CommandsProvider {
    pub fn from_config(config: &CommandsConfig) -> Self {
        Self::with_runner(config, Arc::new(wm::spawn_shell))
    }

    pub fn with_runner(config: &CommandsConfig, runner: Runner) -> Self {
        let nodes = config
            .items
            .iter()
            .map(|item| command_node(&config.id, "", item, &runner))
            .collect();
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            nodes,
            prompt: config.prompt,
            history: Mutex::new(Vec::new()),
            sink: RwLock::new(None),
            runner,
        }
    }

    fn prompt_node(&self) -> FunctionNode {
        FunctionNode::category(PROMPT_ID, "Run…", &self.id)
            .with_dynamic_loading()
            .with_meta(META_CONTENT, PROMPT_ID)
            .with_icon(IconRef::Named(IconName::from("utilities-terminal")))
    }

    fn is_prompt(&self, node: &FunctionNode) -> bool {
        self.prompt && node.id.as_str() == PROMPT_ID && node.provider_id == self.id
    }
}

fn run_action(command: &ShellCommand, runner: &Runner) -> Action {
    let (command, runner) = (command.clone(), runner.clone());
    Action::new(format!("run {command}"), move || Ok(runner(&command)?))
}

/// Writes the default config and opens it in the user's editor.
fn setup_action() -> Action {
    Action::new("setup", || {
        let path = config::write_default_config()?;
        log::info!("Wrote default config to {}", path.display());
        wm::open_path(&path)?;
        Ok(())
    })
}

fn command_node(pid: &ProviderId, parent: &str, item: &CommandItem, runner: &Runner) -> FunctionNode {
    let id = if parent.is_empty() {
        item.name.clone()
    } else {
        format!("{parent}/{}", item.name)
    };

    let mut node = if item.items.is_empty() {
        FunctionNode::leaf(id, &item.name, pid)
    } else {
        let children = item
            .items
            .iter()
            .map(|child| command_node(pid, &id, child, runner))
            .collect();
        FunctionNode::category(id, &item.name, pid).with_children(children)
    };
    if let Some(icon) = &item.icon {
        node = node.with_icon(IconRef::Named(icon.clone()));
    }

    if let Some(ring) = &item.ring {
        return node.on(
            GestureKind::LeftClick,
            Modifiers::empty(),
            ClickBehavior::LaunchRing(ring.clone()),
        );
    }
    let Some(exec) = &item.exec else {
        return node;
    };
    if exec.as_str() == SETUP_COMMAND {
        return node.on(
            GestureKind::LeftClick,
            Modifiers::empty(),
            ClickBehavior::Execute(setup_action()),
        );
    }

    let action = run_action(exec, runner);
    let primary = if item.keep_open {
        ClickBehavior::ExecuteKeepOpen(action.clone())
    } else {
        ClickBehavior::Execute(action.clone())
    };
    node.on(GestureKind::LeftClick, Modifiers::empty(), primary)
        .on(GestureKind::LeftClick, Modifiers::CTRL, ClickBehavior::ExecuteKeepOpen(action))
}

impl Provider for CommandsProvider {
    fn provider_id(&self) -> ProviderId {
        self.id.clone()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn typing_mode_for(&self, node: &FunctionNode) -> TypingMode {
        if self.is_prompt(node) {
            TypingMode::Input
        } else {
            TypingMode::TypeAhead
        }
    }

    fn prefers_panel_for(&self, node: &FunctionNode) -> bool {
        self.is_prompt(node) || node.node_type == NodeType::Folder
    }

    fn is_mutable(&self) -> bool {
        self.prompt
    }

    fn provide_nodes(&self) -> Vec<FunctionNode> {
        let mut nodes = self.nodes.clone();
        if self.prompt {
            nodes.push(self.prompt_node());
        }
        nodes
    }

    /// The prompt lists recent command lines, newest first.
    fn load_children(&self, node: &FunctionNode) -> Vec<FunctionNode> {
        if !self.is_prompt(node) {
            return node.child_nodes().to_vec();
        }
        self.history
            .lock()
            .iter()
            .rev()
            .enumerate()
            .map(|(i, line)| {
                let command = ShellCommand::new(line.as_str());
                FunctionNode::leaf(format!("{PROMPT_ID}/{i}/{line}"), line, &self.id).on(
                    GestureKind::LeftClick,
                    Modifiers::empty(),
                    ClickBehavior::Execute(run_action(&command, &self.runner)),
                )
            })
            .collect()
    }

    fn watch(&self, sink: ChangeSink) {
        *self.sink.write() = Some(sink);
    }

    fn submit_input(&self, content_id: &ContentId, text: &str) -> InputOutcome {
        if !self.prompt || content_id.as_str() != PROMPT_ID {
            return InputOutcome::Ignored;
        }
        let line = text.trim();
        if let Err(e) = (self.runner)(&ShellCommand::new(line)) {
            log::error!("Failed to run '{}': {}", line, e);
            return InputOutcome::KeepOpen;
        }
        {
            let mut history = self.history.lock();
            history.retain(|h| h != line);
            history.push(line.to_string());
            let excess = history.len().saturating_sub(HISTORY_LIMIT);
            history.drain(..excess);
        }
        if let Some(sink) = self.sink.read().as_ref() {
            sink.notify(self.id.clone(), Some(ContentId::from(PROMPT_ID)));
        }
        InputOutcome::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::ConfigId;

    fn item(name: &str, exec: Option<&str>) -> CommandItem {
        CommandItem {
            name: name.into(),
            exec: exec.map(ShellCommand::from),
            ring: None,
            icon: None,
            keep_open: false,
            items: Vec::new(),
        }
    }

    fn recording_runner() -> (Runner, Arc<Mutex<Vec<String>>>) {
        let ran: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = ran.clone();
        let runner: Runner = Arc::new(move |cmd: &ShellCommand| -> std::io::Result<()> {
            sink.lock().push(cmd.to_string());
            Ok(())
        });
        (runner, ran)
    }

    fn config(items: Vec<CommandItem>, prompt: bool) -> CommandsConfig {
        CommandsConfig {
            id: ProviderId::from("commands"),
            name: "Commands".into(),
            items,
            prompt,
        }
    }

    #[test]
    fn groups_become_preloaded_categories() {
        let mut power = item("Power", None);
        power.items = vec![item("Lock", Some("loginctl lock-session")), item("Reboot", Some("reboot"))];
        let mut work = item("Work", None);
        work.ring = Some(ConfigId::from("work"));
        let (runner, ran) = recording_runner();
        let p = CommandsProvider::with_runner(&config(vec![power, work], false), runner);

        let nodes = p.provide_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_type, NodeType::Category);
        assert!(!nodes[0].needs_dynamic_loading);
        let lock = &nodes[0].child_nodes()[0];
        assert_eq!(lock.id.as_str(), "Power/Lock");
        match lock.resolve(GestureKind::LeftClick, Modifiers::empty()) {
            ClickBehavior::Execute(action) => action.run().unwrap(),
            other => panic!("expected execute, got {}", other.kind()),
        }
        assert_eq!(ran.lock().as_slice(), ["loginctl lock-session"]);

        assert_eq!(
            nodes[1].resolve(GestureKind::LeftClick, Modifiers::SHIFT),
            ClickBehavior::LaunchRing(ConfigId::from("work"))
        );
    }

    #[test]
    fn keep_open_items_leave_the_menu_up() {
        let mut toggle = item("Night light", Some("gammastep -x"));
        toggle.keep_open = true;
        let (runner, _) = recording_runner();
        let p = CommandsProvider::with_runner(&config(vec![toggle], false), runner);
        assert!(matches!(
            p.provide_nodes()[0].resolve(GestureKind::LeftClick, Modifiers::empty()),
            ClickBehavior::ExecuteKeepOpen(_)
        ));
    }

    #[test]
    fn setup_item_gets_the_setup_action() {
        let (runner, _) = recording_runner();
        let p = CommandsProvider::with_runner(&config(vec![item("Setup", Some(SETUP_COMMAND))], false), runner);
        match p.provide_nodes()[0].resolve(GestureKind::LeftClick, Modifiers::empty()) {
            ClickBehavior::Execute(action) => assert_eq!(action.label(), "setup"),
            other => panic!("expected execute, got {}", other.kind()),
        }
    }

    #[test]
    fn prompt_runs_typed_commands_and_remembers_them() {
        let (runner, ran) = recording_runner();
        let p = CommandsProvider::with_runner(&config(vec![], true), runner);
        let prompt = p.provide_nodes().pop().unwrap();
        assert_eq!(p.typing_mode_for(&prompt), TypingMode::Input);
        assert!(p.prefers_panel_for(&prompt));
        assert!(p.load_children(&prompt).is_empty());

        let content = prompt.content_id();
        assert_eq!(p.submit_input(&content, " htop "), InputOutcome::Close);
        assert_eq!(p.submit_input(&content, "btop"), InputOutcome::Close);
        assert_eq!(p.submit_input(&content, "htop"), InputOutcome::Close);
        assert_eq!(ran.lock().as_slice(), ["htop", "btop", "htop"]);

        let history = p.load_children(&prompt);
        assert_eq!(
            history.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
            vec!["htop", "btop"]
        );
        assert_eq!(
            p.submit_input(&ContentId::from("elsewhere"), "ls"),
            InputOutcome::Ignored
        );
    }
}
