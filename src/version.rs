pub fn print_version_info() {
    println!("dds3model {}", env!("CARGO_PKG_VERSION"));

    // Set by build.rs when git is available
    if let Some(info) = option_env!("DDS3MODEL_BUILD_COMMIT") {
        println!("build commit: {}", info);
    }
    if let Some(info) = option_env!("DDS3MODEL_BUILD_DATE") {
        println!("build date: {}", info);
    }
}
