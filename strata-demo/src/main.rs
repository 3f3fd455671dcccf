mod scenarios;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    // Scenario names can be passed to run a subset: `strata-demo music loops`
    let selected: Vec<String> = std::env::args().skip(1).collect();
    scenarios::run(&selected)
}
