//! Aberred core headless runner.
//!
//! Loads a Lua script against the core engines and simulates a fixed number
//! of frames at a fixed delta:
//!
//! 1. Load `config.ini` (defaults when missing), apply command-line overrides
//! 2. Create the Lua runtime, the core [`Runtime`] and the `engine` API
//! 3. Run the entry script
//! 4. Each frame: apply scripted taps, `tick`, call the script's global
//!    `on_frame(frame, dt)` when it defines one
//! 5. Optionally reload the script mid-run and print stats as JSON
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --frames 120 --tap jump@30 --stats
//! ```

use std::path::PathBuf;

use aberredcore::resources::coreconfig::CoreConfig;
use aberredcore::resources::lua_runtime::{LuaHost, LuaRuntime};
use aberredcore::runtime::Runtime;
use clap::Parser;
use log::{error, info, warn};

/// Aberred core runner
#[derive(Parser)]
#[command(version, about = "Headless frame runner for the Aberred core engines")]
struct Cli {
    /// Configuration file.
    #[arg(long, value_name = "PATH", default_value = "./config.ini")]
    config: PathBuf,

    /// Entry script (overrides `[runner] script`).
    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,

    /// Frames to simulate (overrides `[runner] frames`).
    #[arg(long)]
    frames: Option<u64>,

    /// Seconds per frame (overrides `[runner] fixed_dt`).
    #[arg(long)]
    dt: Option<f32>,

    /// Clear the engines and re-run the script before this frame.
    #[arg(long, value_name = "FRAME")]
    reload_at: Option<u64>,

    /// Press ACTION on FRAME and release it on the next one. Repeatable.
    #[arg(long, value_name = "ACTION@FRAME", value_parser = parse_tap)]
    tap: Vec<(String, u64)>,

    /// Print engine stats as JSON when the run ends.
    #[arg(long)]
    stats: bool,
}

fn parse_tap(s: &str) -> Result<(String, u64), String> {
    let (action, frame) = s
        .rsplit_once('@')
        .ok_or_else(|| format!("expected ACTION@FRAME, got '{}'", s))?;
    let frame = frame
        .parse()
        .map_err(|e| format!("bad frame in '{}': {}", s, e))?;
    Ok((action.to_owned(), frame))
}

fn load_script(lua: &LuaRuntime, config: &CoreConfig) -> bool {
    match lua.run_script(&config.script) {
        Ok(()) => {
            info!("Loaded script {:?}", config.script);
            true
        }
        Err(e) => {
            error!("Error running script {:?}: {}", config.script, e);
            false
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = CoreConfig::with_path(&cli.config);
    if let Err(e) = config.load_from_file() {
        warn!("{}; using defaults", e);
    }
    if let Some(script) = cli.script {
        config.script = script;
    }
    if let Some(frames) = cli.frames {
        config.frames = frames;
    }
    if let Some(dt) = cli.dt {
        config.fixed_dt = dt;
    }

    let lua = LuaRuntime::new().expect("Failed to create Lua runtime");
    let mut runtime: Runtime<LuaHost> = Runtime::new(lua.host(), config.clone());
    lua.register_engine_api(runtime.engines())
        .expect("Failed to register engine API");

    if !load_script(&lua, &config) {
        std::process::exit(1);
    }
    let mut has_on_frame = lua.has_function("on_frame");

    info!("Running {} frames at dt={}", config.frames, config.fixed_dt);
    for frame in 0..config.frames {
        if cli.reload_at == Some(frame) {
            info!("Reloading script at frame {}", frame);
            runtime.clear();
            if !load_script(&lua, &config) {
                std::process::exit(1);
            }
            has_on_frame = lua.has_function("on_frame");
        }

        {
            let mut input = runtime.input_mut();
            for (action, at) in &cli.tap {
                if *at == frame {
                    input.press(action);
                } else if *at + 1 == frame {
                    input.release(action);
                }
            }
        }

        runtime.tick(config.fixed_dt);

        if has_on_frame
            && let Err(e) = lua.call_function::<_, ()>("on_frame", (frame, config.fixed_dt))
        {
            error!(target: "script", "Error in on_frame: {}", e);
        }
    }

    let stats = runtime.stats();
    info!("Finished after {} frames: {:?}", config.frames, stats);
    if cli.stats {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Serializing stats: {}", e),
        }
    }
}
