use pmta_ip_picker::toml_config::TomlConfig;

fn main() -> anyhow::Result<()> {
    println!("🧪 Testing TOML Configuration Loading");

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| TomlConfig::default_path().to_string());

    let toml_config = TomlConfig::load_from_file(&path)?;
    println!("✅ TOML config loaded successfully from {}", path);
    println!("   IPs per PMTA: {}", toml_config.selection.cap);
    println!("   Tie-break: {}", toml_config.selection.tie_break);
    println!(
        "   Output: {}/{}_*.{}",
        toml_config.output.directory, toml_config.output.prefix, toml_config.output.format
    );
    println!("   Workers: {}", toml_config.engine.workers);

    if let Some(level) = toml_config.log_level() {
        println!("   Log level: {}", level);
    }

    let settings = toml_config.to_settings()?;
    println!("✅ Converted to run settings successfully");
    println!("   {:?}", settings);

    Ok(())
}
