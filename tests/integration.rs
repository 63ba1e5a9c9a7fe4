use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_tortuga"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn prepare_dir(name: &str, config_contents: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    fs::write(test_dir.join("config.toml"), config_contents)
        .expect("failed to write config file");

    test_dir
}

#[test]
fn grid_workflow() {
    let config_contents = String::new()
        + "seed = 1234\n"
        + "\n"
        + "[model]\n"
        + "turtles = 400\n"
        + "i0 = 5\n"
        + "r0 = 3.5\n"
        + "ti = 5.5\n"
        + "tr = 6.5\n"
        + "ticks_per_day = 5\n"
        + "ti_dist = \"gamma\"\n"
        + "tr_dist = \"exponential\"\n"
        + "p_dist = \"negative_binomial\"\n"
        + "\n"
        + "[topology]\n"
        + "kind = \"grid\"\n"
        + "width = 20\n"
        + "height = 20\n"
        + "\n"
        + "[output]\n"
        + "n_steps = 300\n"
        + "stop_when_extinct = true\n"
        + "steps_per_print = 50\n"
        + "prt_lvl = \"concise\"\n";

    let test_dir = prepare_dir("grid_workflow", &config_contents);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    for run_dir in ["run-0000", "run-0001"] {
        let trajectory = fs::read_to_string(test_dir.join(run_dir).join("trajectory.csv"))
            .expect("failed to read trajectory");
        let mut lines = trajectory.lines();
        assert_eq!(lines.next(), Some("tick,day,s,e,i,r"));
        assert_eq!(lines.next(), Some("0,0.0,395,0,5,0"));

        let parameters = fs::read_to_string(test_dir.join(run_dir).join("parameters.csv"))
            .expect("failed to read parameters");
        assert_eq!(parameters.lines().count(), 401);
    }

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let results = fs::read_to_string(test_dir.join("results.toml")).expect("failed to read results");
    for name in ["peak_infected", "peak_day", "attack_rate", "duration"] {
        assert!(results.contains(&format!("[{name}]")), "missing {name} in\n{results}");
    }
    assert!(test_dir.join("average.csv").exists());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);

    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("results.toml").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn network_workflow() {
    let config_contents = r#"
[model]
turtles = 500
i0 = 10
r0 = 2.5
ti = 3.0
tr = 4.0
ticks_per_day = 2
ti_dist = "fixed"
tr_dist = "fixed"
p_dist = "poisson"

[topology]
kind = "erdos_renyi"
prob = 0.02

[output]
n_steps = 200
steps_per_print = 20
prt_lvl = "mute"
"#;

    let test_dir = prepare_dir("network_workflow", config_contents);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);

    let trajectory = fs::read_to_string(test_dir.join("run-0000").join("trajectory.csv"))
        .expect("failed to read trajectory");
    assert_eq!(trajectory.lines().count(), 202);

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    run_bin(&["--sim-dir", test_dir_str, "clean"]);

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let config_contents = r#"
[model]
turtles = 10
i0 = 20
r0 = 3.5
ti = 5.5
tr = 6.5
ticks_per_day = 5
ti_dist = "fixed"
tr_dist = "fixed"
p_dist = "fixed"

[topology]
kind = "grid"
width = 5
height = 5

[output]
n_steps = 10
steps_per_print = 1
"#;

    let test_dir = prepare_dir("invalid_config_fails", config_contents);

    let output = Command::new(env!("CARGO_BIN_EXE_tortuga"))
        .args(["--sim-dir", test_dir.to_str().unwrap(), "create"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
