fn main() {

    // record the target triple so `pixmask version` can report what it was built for

    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=PIXMASK_BUILD_TARGET={}", target);

    // the profile tells release builds apart from debug ones in bug reports

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=PIXMASK_BUILD_PROFILE={}", profile);

    println!("cargo:rerun-if-changed=build.rs");
}
