use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use colored::Colorize;
use hb_diff::{diff_commits, diff_directories, TreeChange};
use hb_index::{DirectoryBrowser, ShaCache};
use hb_ledger::{PeerConfig, SourceStore};
use hb_server::{HbServer, ServerConfig};
use hb_sync::{pull, push_directory, LocalStore, PullOptions, PullStatus, RemoteStore};
use hb_types::ContentHash;

use crate::cli::*;
use crate::config::Settings;
use crate::remote::RemoteSpec;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli.store)?;
    match cli.command {
        Command::Push(args) => cmd_push(&cli.store, &settings, args).await,
        Command::Pull(args) => cmd_pull(&cli.store, &settings, args).await,
        Command::Log(args) => cmd_log(&open_store(&cli.store, &settings)?, args),
        Command::Show(args) => cmd_show(&open_store(&cli.store, &settings)?, args),
        Command::Diff(args) => cmd_diff(&open_store(&cli.store, &settings)?, args),
        Command::Sources => cmd_sources(&open_store(&cli.store, &settings)?),
        Command::Serve(args) => cmd_serve(&cli.store, &settings, args).await,
        Command::Peer(args) => cmd_peer(&open_store(&cli.store, &settings)?, args),
    }
}

fn open_store(root: &Path, settings: &Settings) -> anyhow::Result<SourceStore> {
    SourceStore::open(root, settings.ledger.clone())
        .with_context(|| format!("opening store at {}", root.display()))
}

fn parse_hash(text: &str) -> anyhow::Result<ContentHash> {
    text.parse::<ContentHash>()
        .with_context(|| format!("not a content hash: {text}"))
}

fn format_date(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

async fn cmd_push(store_root: &Path, settings: &Settings, args: PushArgs) -> anyhow::Result<()> {
    let local = open_store(store_root, settings)?;
    let target: Arc<dyn RemoteStore> = match &args.to {
        Some(to) => {
            let spec = RemoteSpec::resolve(to, &local)?;
            println!("Pushing {} to {}", args.path.display().to_string().bold(), spec);
            spec.connect(&settings.ledger).await?
        }
        None => Arc::new(LocalStore::new(Arc::new(local))),
    };

    let cache = ShaCache::open(&args.path, settings.ledger.sha_cache.clone())
        .with_context(|| format!("opening hash cache in {}", args.path.display()))?;
    let browser = Arc::new(DirectoryBrowser::new(Arc::new(cache)));
    let result = push_directory(&args.path, target, &args.source, browser, &settings.sync).await?;

    println!(
        "  {} files, {} directories, {} objects sent ({} bytes)",
        result.files, result.directories, result.hashes_transferred, result.bytes_transferred
    );
    if result.failed > 0 {
        bail!(
            "{} objects failed to transfer; run push again to resume",
            result.failed
        );
    }
    match result.commit {
        Some(commit) => println!(
            "{} {} now at {}",
            "✓".green().bold(),
            args.source.yellow(),
            commit.short_hex().cyan()
        ),
        None => println!("{} {} unchanged", "✓".green().bold(), args.source.yellow()),
    }
    Ok(())
}

async fn cmd_pull(store_root: &Path, settings: &Settings, args: PullArgs) -> anyhow::Result<()> {
    let local = open_store(store_root, settings)?;
    let spec = RemoteSpec::resolve(&args.from, &local)?;
    let source = spec.connect(&settings.ledger).await?;
    let dest = LocalStore::new(Arc::new(local));
    let options = PullOptions::from(&settings.sync).forced(args.force);

    println!("Pulling {} from {}", args.source.yellow(), spec);
    let result = pull(source.as_ref(), &dest, &args.source, &options).await?;
    let status = match result.status {
        PullStatus::UpToDate => "up to date".green(),
        PullStatus::FastForward => "fast-forward".green(),
        PullStatus::Forced => "forced".red(),
        PullStatus::Created => "created".green(),
    };
    println!(
        "  {}: {} commits, {} bytes",
        status, result.commits_transferred, result.bytes_transferred
    );
    if result.malformed_entries > 0 {
        println!(
            "  {} {} malformed entries skipped",
            "warning:".yellow(),
            result.malformed_entries
        );
    }
    if result.failed > 0 {
        bail!("{} objects failed to transfer; pointer left unchanged", result.failed);
    }
    if !result.pointer_updated && result.status != PullStatus::UpToDate {
        println!("  {} destination source is read-only", "note:".yellow());
    }
    Ok(())
}

fn cmd_log(store: &SourceStore, args: LogArgs) -> anyhow::Result<()> {
    let history = store.history(&args.source, Some(args.limit))?;
    if history.is_empty() {
        println!("No commits for {}.", args.source.yellow());
        return Ok(());
    }
    for (hash, commit) in history {
        if args.oneline {
            println!("{} {}", hash.short_hex().cyan(), format_date(commit.commit_date));
            continue;
        }
        println!("{} {}", "commit".yellow(), hash.to_string().yellow());
        println!("Date:   {}", format_date(commit.commit_date));
        println!("Tree:   {}", commit.directory_descriptor_sha);
        if let Some(parent) = commit.parent_sha {
            println!("Parent: {}", parent);
        }
        println!();
    }
    Ok(())
}

fn cmd_show(store: &SourceStore, args: ShowArgs) -> anyhow::Result<()> {
    let hash = parse_hash(&args.hash)?;
    if let Some(commit) = store.get_commit(&hash) {
        println!("{} {}", "commit".yellow(), hash);
        println!("Date:   {}", format_date(commit.commit_date));
        println!("Tree:   {}", commit.directory_descriptor_sha);
        match commit.parent_sha {
            Some(parent) => println!("Parent: {}", parent),
            None => println!("Parent: (none)"),
        }
        return Ok(());
    }
    if let Some(dir) = store.get_directory_descriptor(&hash) {
        println!("{} {} ({} entries)", "directory".yellow(), hash, dir.len());
        for entry in &dir.files {
            let kind = if entry.is_directory { "dir " } else { "file" };
            let sha = entry
                .content_sha
                .map(|h| h.short_hex())
                .unwrap_or_else(|| "-".into());
            println!("  {} {} {:>12} {}", kind, sha.cyan(), entry.size, entry.name);
        }
        return Ok(());
    }
    let length = store.objects().has_bytes(&hash)?;
    if length > 0 || hash.is_empty_sentinel() {
        println!("{} {} ({} bytes)", "blob".yellow(), hash, length);
        return Ok(());
    }
    bail!("object {} not found", hash.short_hex())
}

fn print_change(change: &TreeChange) {
    let code = change.code().to_string();
    let code = match change {
        TreeChange::Added { .. } => code.green(),
        TreeChange::Deleted { .. } => code.red(),
        _ => code.yellow(),
    };
    match change {
        TreeChange::Renamed {
            old_path, new_path, ..
        } => println!("{}  {} -> {}", code, old_path, new_path),
        other => println!("{}  {}", code, other.path()),
    }
}

fn cmd_diff(store: &SourceStore, args: DiffArgs) -> anyhow::Result<()> {
    let old = parse_hash(&args.old)?;
    let new = parse_hash(&args.new)?;
    let repo = store.objects().as_ref();
    let diff = if store.get_commit(&new).is_some() {
        diff_commits(repo, Some(&old), &new)?
    } else {
        diff_directories(repo, Some(&old), &new)?
    };
    if diff.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    for change in &diff.changes {
        print_change(change);
    }
    Ok(())
}

fn cmd_sources(store: &SourceStore) -> anyhow::Result<()> {
    let sources = store.get_sources()?;
    if sources.is_empty() {
        println!("No sources.");
        return Ok(());
    }
    for id in sources {
        let state = store.get_source_state(&id)?;
        let head = state
            .current_commit_sha
            .map(|h| h.short_hex().cyan().to_string())
            .unwrap_or_else(|| "(empty)".dimmed().to_string());
        let mut flags = Vec::new();
        if state.is_readonly() {
            flags.push("read-only");
        }
        if state.has_open_transaction() {
            flags.push("transaction open");
        }
        if flags.is_empty() {
            println!("{:<24} {}", id.bold(), head);
        } else {
            println!("{:<24} {} [{}]", id.bold(), head, flags.join(", "));
        }
    }
    Ok(())
}

async fn cmd_serve(store_root: &Path, settings: &Settings, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig {
            store_root: store_root.to_path_buf(),
            ledger: settings.ledger.clone(),
            ..ServerConfig::default()
        },
    };
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address: {bind}"))?;
    }
    println!(
        "hashback server on {} (store: {})",
        config.bind_addr.to_string().bold(),
        config.store_root.display()
    );
    HbServer::open(config)?.serve().await?;
    Ok(())
}

fn cmd_peer(store: &SourceStore, args: PeerArgs) -> anyhow::Result<()> {
    match args.action.unwrap_or(PeerAction::List) {
        PeerAction::Add { name, address } => {
            store.put_peer(&PeerConfig::new(&name, &address))?;
            println!("{} Added peer {} -> {}", "✓".green(), name.bold(), address);
        }
        PeerAction::Remove { name } => {
            if store.get_peer(&name)?.is_none() {
                bail!("no peer named {name}");
            }
            store.remove_peer(&name)?;
            println!("{} Removed peer {}", "✓".green(), name.bold());
        }
        PeerAction::List => {
            let peers = store.list_peers()?;
            if peers.is_empty() {
                println!("No peers.");
            }
            for peer in peers {
                println!("{:<16} {}", peer.name.bold(), peer.address);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[tokio::test]
    async fn push_into_local_store_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let store = dir.path().join("store");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("a.txt"), b"alpha").unwrap();
        let data_arg = data.to_str().unwrap();
        let store_arg = store.to_str().unwrap();

        run_command(cli(&["hb", "--store", store_arg, "push", data_arg, "-s", "laptop"]))
            .await
            .unwrap();

        let opened = open_store(&store, &Settings::default()).unwrap();
        assert_eq!(opened.get_sources().unwrap(), vec!["laptop".to_string()]);
        let history = opened.history("laptop", None).unwrap();
        assert_eq!(history.len(), 1);
        let head = history[0].0.to_string();
        drop(opened);

        run_command(cli(&["hb", "--store", store_arg, "log", "-s", "laptop"]))
            .await
            .unwrap();
        run_command(cli(&["hb", "--store", store_arg, "show", &head]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pull_from_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let primary = dir.path().join("primary");
        let mirror = dir.path().join("mirror");
        fs::create_dir_all(data.join("sub")).unwrap();
        fs::write(data.join("sub").join("b.txt"), b"bravo").unwrap();

        run_command(cli(&[
            "hb",
            "--store",
            primary.to_str().unwrap(),
            "push",
            data.to_str().unwrap(),
            "-s",
            "laptop",
        ]))
        .await
        .unwrap();
        run_command(cli(&[
            "hb",
            "--store",
            mirror.to_str().unwrap(),
            "pull",
            "-s",
            "laptop",
            "--from",
            primary.to_str().unwrap(),
        ]))
        .await
        .unwrap();

        let primary_head = open_store(&primary, &Settings::default())
            .unwrap()
            .get_source_state("laptop")
            .unwrap()
            .current_commit_sha;
        let mirror_head = open_store(&mirror, &Settings::default())
            .unwrap()
            .get_source_state("laptop")
            .unwrap()
            .current_commit_sha;
        assert!(primary_head.is_some());
        assert_eq!(primary_head, mirror_head);
    }

    #[tokio::test]
    async fn peers_are_managed() {
        let dir = tempfile::tempdir().unwrap();
        let store_arg = dir.path().to_str().unwrap();
        run_command(cli(&["hb", "--store", store_arg, "peer", "add", "nas", "tcp://nas:9419"]))
            .await
            .unwrap();
        let peers = open_store(dir.path(), &Settings::default())
            .unwrap()
            .list_peers()
            .unwrap();
        assert_eq!(peers, vec![PeerConfig::new("nas", "tcp://nas:9419")]);

        run_command(cli(&["hb", "--store", store_arg, "peer", "remove", "nas"]))
            .await
            .unwrap();
        assert!(run_command(cli(&["hb", "--store", store_arg, "peer", "remove", "nas"]))
            .await
            .is_err());
    }

    #[test]
    fn show_rejects_bad_hash() {
        assert!(parse_hash("zz").is_err());
    }
}
