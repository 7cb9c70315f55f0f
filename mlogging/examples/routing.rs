use mlogging::{DefaultsUpdate, LoggerOption, logger_config};

fn main() {
    let root = std::env::temp_dir().join("mlogging_example");
    mlogging::set_defaults(DefaultsUpdate::new().with_local_root(&root));

    // screen and file, warnings and debug messages only
    let log = logger_config("example.jobs")
        .with_local()
        .with_levels(["warning", "debug"])
        .init()
        .unwrap();
    log.debug("starting");
    log.info("not shown");
    log.warning("queue is filling up");

    let moved = root.join("moved");
    mlogging::set_option("example.jobs", LoggerOption::LocalRoot(moved.clone())).unwrap();
    log.warning("now written under the new root");

    mlogging::set_option(
        "example.jobs",
        LoggerOption::Format("{level}: {message}".into()),
    )
    .unwrap();
    log.debug("short format");
    log.flush();

    for dir in [&root, &moved] {
        let path = dir.join("example").join("jobs");
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        println!("--- {}\n{}", path.display(), content.trim_end());
    }

    mlogging::reset("example.jobs").unwrap();
    log.critical("silenced");
}
