// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use filegroups::{
    config::Settings,
    path::{default_config_file, to_absolute},
    store::watch::{StoreWatcher, WatchEvent},
    DropTarget, GroupId, GroupPatch, Outcome, SortOrder, StoreKey, Workspace,
};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use inquire::Confirm;
use std::{
    env::current_dir,
    path::{absolute, Path, PathBuf},
    process::exit,
};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "filegroups [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Project root to operate on instead of the current directory.
    #[arg(short, long, global = true, value_name = "path")]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => default_config_file()?,
        };

        Ok(Settings::load(path)?)
    }

    async fn run(self, settings: Settings) -> Result<()> {
        let root = match &self.project {
            Some(path) => absolute(path)?,
            None => current_dir()?,
        };
        let mut workspace = Workspace::open(root, &settings)?;

        if settings.sweep_on_startup && !matches!(self.command, Command::Check(_)) {
            let missing = workspace.missing_members().len();
            if missing > 0 {
                warn!("{missing} group members are unreachable, run `filegroups check` to clean up");
            }
        }

        match self.command {
            Command::List(opts) => run_list(&workspace, opts),
            Command::Create(opts) => run_create(&mut workspace, opts),
            Command::Add(opts) => run_add(&mut workspace, opts),
            Command::Remove(opts) => run_remove(&mut workspace, opts),
            Command::Delete(opts) => run_delete(&mut workspace, opts),
            Command::Move(opts) => run_move(&mut workspace, opts),
            Command::Set(opts) => run_set(&mut workspace, opts),
            Command::Reorder(opts) => run_reorder(&mut workspace, opts),
            Command::HideGlobal(opts) => run_hide_global(&mut workspace, opts),
            Command::Check(opts) => run_check(&mut workspace, opts),
            Command::Watch => run_watch(workspace).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show group tree of project.
    #[command(override_usage = "filegroups list [options]")]
    List(ListOptions),

    /// Create new group.
    #[command(override_usage = "filegroups create [options] <name>")]
    Create(CreateOptions),

    /// Add files or folders matching glob patterns to group.
    #[command(override_usage = "filegroups add [options] <group> <pattern>...")]
    Add(AddOptions),

    /// Remove members from group.
    #[command(override_usage = "filegroups remove [options] <group> <path>...")]
    Remove(RemoveOptions),

    /// Delete groups together with all of their subgroups.
    #[command(override_usage = "filegroups delete [options] <group>...")]
    Delete(DeleteOptions),

    /// Move group or member to another place in the tree.
    #[command(override_usage = "filegroups move [options] <group>")]
    Move(MoveOptions),

    /// Change group metadata.
    #[command(override_usage = "filegroups set [options] <group>")]
    Set(SetOptions),

    /// Reorder sibling groups.
    #[command(override_usage = "filegroups reorder [options] <group>...")]
    Reorder(ReorderOptions),

    /// Hide or show global groups for this project.
    #[command(override_usage = "filegroups hide-global [options]")]
    HideGlobal(HideGlobalOptions),

    /// Find unreachable members and offer to remove them.
    #[command(override_usage = "filegroups check [options]")]
    Check(CheckOptions),

    /// Keep members in sync with filesystem changes until interrupted.
    #[command(override_usage = "filegroups watch [options]")]
    Watch,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Show group identifiers.
    #[arg(short, long)]
    pub ids: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CreateOptions {
    /// Name of new group.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Create as subgroup of target group.
    #[arg(long, value_name = "group")]
    pub parent: Option<String>,

    /// Create in global store.
    #[arg(short, long)]
    pub global: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Group to add members to.
    #[arg(required = true, value_name = "group")]
    pub group: String,

    /// Glob patterns relative to project root.
    #[arg(required = true, value_name = "pattern")]
    pub patterns: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Group to remove members from.
    #[arg(required = true, value_name = "group")]
    pub group: String,

    /// Member paths relative to project root.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// Groups to delete.
    #[arg(required = true, value_name = "group")]
    pub groups: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MoveOptions {
    /// Group to move, or group holding the member to move.
    #[arg(required = true, value_name = "group")]
    pub group: String,

    /// Move into target group.
    #[arg(short, long, group = "target", value_name = "group")]
    pub into: Option<String>,

    /// Move to top level of local store.
    #[arg(short, long, group = "target")]
    pub local: bool,

    /// Move to top level of global store.
    #[arg(short, long, group = "target")]
    pub global: bool,

    /// Move this member instead of the group itself, requires `--into`.
    #[arg(short, long, value_name = "path", requires = "into")]
    pub member: Option<PathBuf>,

    /// Place moved member before this member of target group.
    #[arg(short, long, value_name = "path", requires = "member")]
    pub before: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetOptions {
    /// Group to change.
    #[arg(required = true, value_name = "group")]
    pub group: String,

    /// New group name.
    #[arg(long, value_name = "name")]
    pub name: Option<String>,

    /// New icon.
    #[arg(long, value_name = "icon")]
    pub icon: Option<String>,

    /// New color, palette token or hex literal.
    #[arg(long, value_name = "color")]
    pub color: Option<String>,

    /// One line description, empty to clear.
    #[arg(long, value_name = "summary")]
    pub description: Option<String>,

    /// Free-form notes, empty to clear.
    #[arg(long, value_name = "text")]
    pub details: Option<String>,

    /// Badge text of at most two characters, empty to clear.
    #[arg(long, value_name = "text")]
    pub badge: Option<String>,

    /// Pin or unpin group.
    #[arg(long, value_name = "bool")]
    pub pinned: Option<bool>,

    /// Collapse or expand group.
    #[arg(long, value_name = "bool")]
    pub collapsed: Option<bool>,

    /// Member sort policy.
    #[arg(long, value_name = "order")]
    pub sort: Option<SortOrder>,

    /// Apply to all subgroups as well.
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ReorderOptions {
    /// Sibling groups in their new order.
    #[arg(required = true, value_name = "group")]
    pub groups: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct HideGlobalOptions {
    /// Show global groups again.
    #[arg(short, long)]
    pub show: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CheckOptions {
    /// Remove unreachable members without asking.
    #[arg(short, long)]
    pub yes: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = cli.settings();
    let fallback = match &settings {
        Ok(settings) => settings.log_filter.clone(),
        Err(_) => "info".into(),
    };

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run(cli, settings).await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run(cli: Cli, settings: Result<Settings>) -> Result<()> {
    cli.run(settings?).await
}

fn run_list(workspace: &Workspace, opts: ListOptions) -> Result<()> {
    let tree = workspace.presenter().render(opts.ids);
    if tree.is_empty() {
        info!("no groups in {:?}", workspace.project_root().display());
    } else {
        print!("{tree}");
    }

    Ok(())
}

fn run_create(workspace: &mut Workspace, opts: CreateOptions) -> Result<()> {
    let parent = opts
        .parent
        .as_deref()
        .map(|parent| resolve(workspace, parent))
        .transpose()?;
    let store_key = if opts.global {
        StoreKey::Global
    } else {
        StoreKey::Local
    };

    let id = workspace
        .create_group(&opts.name, parent.as_ref(), store_key)
        .ok_or_else(|| anyhow!("failed to create group {:?}", opts.name))?;
    println!("{id}");

    Ok(())
}

fn run_add(workspace: &mut Workspace, opts: AddOptions) -> Result<()> {
    let id = resolve(workspace, &opts.group)?;
    let paths = expand_patterns(workspace.project_root(), &opts.patterns)?;
    let added = workspace.add_paths(&id, paths);
    info!("added {added} members to {:?}", opts.group);

    Ok(())
}

fn run_remove(workspace: &mut Workspace, opts: RemoveOptions) -> Result<()> {
    let id = resolve(workspace, &opts.group)?;
    for path in opts.paths {
        let path = to_absolute(&path, workspace.project_root());
        if !workspace.remove_member(&id, &path) {
            warn!("{:?} is not a member of {:?}", path.display(), opts.group);
        }
    }

    Ok(())
}

fn run_delete(workspace: &mut Workspace, opts: DeleteOptions) -> Result<()> {
    for group in opts.groups {
        let id = resolve(workspace, &group)?;
        let deleted = workspace.delete_group(&id);
        info!(
            "deleted {} groups holding {} members",
            deleted.removed.len(),
            deleted.members.len()
        );
    }

    Ok(())
}

fn run_move(workspace: &mut Workspace, opts: MoveOptions) -> Result<()> {
    let id = resolve(workspace, &opts.group)?;
    let into = opts
        .into
        .as_deref()
        .map(|group| resolve(workspace, group))
        .transpose()?;

    if let Some(member) = opts.member {
        let Some(into) = into else {
            bail!("moving a member requires a target group");
        };
        let root = workspace.project_root().to_path_buf();
        let before = opts.before.map(|before| to_absolute(before, &root));
        let outcome = workspace.move_member(&id, &into, to_absolute(member, &root), before.as_deref());
        return report(outcome);
    }

    let target = match (into, opts.local, opts.global) {
        (Some(into), _, _) => DropTarget::Group(into),
        (None, true, _) => DropTarget::LocalRoot,
        (None, _, true) => DropTarget::GlobalSection,
        (None, false, false) => bail!("specify where to move the group"),
    };

    report(workspace.drop_group(&id, target))
}

fn run_set(workspace: &mut Workspace, opts: SetOptions) -> Result<()> {
    let id = resolve(workspace, &opts.group)?;
    let clearable = |text: Option<String>| text.map(|text| Some(text).filter(|text| !text.is_empty()));
    let patch = GroupPatch {
        name: opts.name,
        icon: opts.icon,
        color: opts.color,
        short_description: clearable(opts.description),
        details: clearable(opts.details),
        badge_text: clearable(opts.badge),
        pinned: opts.pinned,
        collapsed: opts.collapsed,
        sort_order: opts.sort,
        ..Default::default()
    };

    if patch.is_empty() {
        bail!("nothing to set");
    }

    let outcome = if opts.recursive {
        workspace.update_group_recursive(&id, &patch)
    } else {
        workspace.update_group(&id, &patch)
    };

    report(outcome)
}

fn run_reorder(workspace: &mut Workspace, opts: ReorderOptions) -> Result<()> {
    let ids = opts
        .groups
        .iter()
        .map(|group| resolve(workspace, group))
        .collect::<Result<Vec<_>>>()?;

    report(workspace.reorder_siblings(&ids))
}

fn run_hide_global(workspace: &mut Workspace, opts: HideGlobalOptions) -> Result<()> {
    if workspace.set_hide_global_groups(!opts.show) {
        info!("global groups {}", if opts.show { "shown" } else { "hidden" });
    }

    Ok(())
}

fn run_check(workspace: &mut Workspace, opts: CheckOptions) -> Result<()> {
    let missing = workspace.missing_members();
    if missing.is_empty() {
        info!("all group members are reachable");
        return Ok(());
    }

    for member in &missing {
        warn!("unreachable member {:?}", member.path.display());
    }

    let confirmed = opts.yes
        || Confirm::new(&format!("Remove {} unreachable members?", missing.len()))
            .with_default(false)
            .prompt()?;
    if confirmed {
        let removed = workspace.cleanup_missing_files();
        info!("removed {} unreachable members", removed.len());
    }

    Ok(())
}

async fn run_watch(mut workspace: Workspace) -> Result<()> {
    let (sender, mut receiver) = unbounded_channel::<WatchEvent>();
    let _watcher = StoreWatcher::spawn(workspace.watch_targets(), sender)?;
    info!("watching for changes, press ctrl-c to stop");

    loop {
        tokio::select! {
            Some(event) = receiver.recv() => {
                for path in workspace.apply_watch_event(event) {
                    debug!("refresh decoration of {:?}", path.display());
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    workspace.close();
    Ok(())
}

fn resolve(workspace: &Workspace, id_or_name: &str) -> Result<GroupId> {
    workspace
        .find_group(id_or_name)
        .map(|group| group.id)
        .ok_or_else(|| anyhow!("no single group matches {id_or_name:?}"))
}

fn expand_patterns(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let absolute = to_absolute(pattern, root);
        let before = paths.len();
        for entry in glob::glob(&absolute.to_string_lossy())? {
            paths.push(entry?);
        }

        if paths.len() == before {
            warn!("pattern {pattern:?} matched nothing");
        }
    }

    Ok(paths)
}

fn report(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Unchanged => {
            info!("nothing changed");
            Ok(())
        }
        Outcome::NotFound => bail!("group or member not found"),
        Outcome::Rejected(rejection) => Err(rejection.into()),
    }
}
