use clap::{Parser, Subcommand};
use orbitctl::desktop::{self, AppInfo, AppQuery};
use orbitctl::ipc::{self, Request};
use orbitctl::wm::{self, ShellCommand, WindowClass};

#[derive(Parser, Debug)]
#[command(name = "orbitctl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// The application name or window class (used to find desktop entry)
    name: Option<String>,

    /// Explicitly specify the window class to match (overrides desktop entry and name)
    #[arg(short = 'c', long)]
    class: Option<String>,

    /// The command to execute if the window is not found (overrides desktop entry)
    #[arg(short = 'e', long)]
    exec: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Show the menu at the cursor.
    Show {
        /// Open straight into this provider's category.
        #[arg(long)]
        expand: Option<String>,
    },
    /// Show a specific ring configuration.
    Ring { id: String },
    /// Hide the menu.
    Hide,
    /// Execute the hovered or selected item.
    Execute,
    /// Forward a raw input event, e.g. `orbitctl input down left local ctrl`.
    Input {
        #[arg(trailing_var_arg = true, required = true)]
        event: Vec<String>,
    },
    /// Report the end of a drag session started by the menu.
    Drop {
        #[arg(long)]
        cancelled: bool,
    },
    /// List the applications orbit can see.
    Apps,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let request = match cli.command {
        Some(Commands::Show { expand }) => Request::Show { expand },
        Some(Commands::Ring { id }) => Request::ShowConfig(id),
        Some(Commands::Hide) => Request::Hide,
        Some(Commands::Execute) => Request::Execute,
        Some(Commands::Input { event }) => Request::Input(event.join(" ")),
        Some(Commands::Drop { cancelled }) => Request::DragFinished {
            success: !cancelled,
        },
        Some(Commands::Apps) => return list_apps(),
        None => {
            return match cli.name {
                Some(query) => run_or_raise(query, cli.class, cli.exec),
                None => {
                    use clap::CommandFactory;
                    Cli::command().print_help()?;
                    Ok(())
                }
            };
        }
    };

    log::debug!("sending '{request}'");
    ipc::send(&request)?;
    Ok(())
}

fn list_apps() -> anyhow::Result<()> {
    for app in desktop::all_entries() {
        println!("{}\t{}\t{}", app.name, app.class, app.exec);
    }
    Ok(())
}

fn run_or_raise(query: String, class: Option<String>, exec: Option<String>) -> anyhow::Result<()> {
    let app = AppInfo::resolve(
        &AppQuery::new(query.as_str()),
        class.map(WindowClass::new),
        exec.map(ShellCommand::new),
    );

    if !app.is_launchable() {
        anyhow::bail!(
            "Could not find a desktop entry for '{}' and no --exec was provided.",
            query
        );
    }

    wm::run_or_raise(&app.class, &app.exec)?;
    Ok(())
}
