// Stamp `chatreel --version` with the short commit hash when built from a checkout.
fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
    else {
        return;
    };
    if !output.status.success() {
        return;
    }
    let hash = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if !hash.is_empty() {
        println!("cargo:rustc-env=CHATREEL_GIT_HASH={hash}");
    }
}
