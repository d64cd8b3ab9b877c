//! Built-in baseline rules shipped with the engine

use crate::registry::RuleCatalog;
use hardtack_core::{ExpectedValue, OsType, Result, Rule, SettingValue, Severity, ValueSchema};

/// Approved SSH ciphers for the cipher allow-list rule
const SSH_CIPHERS: &[&str] = &[
    "aes256-gcm@openssh.com",
    "chacha20-poly1305@openssh.com",
    "aes256-ctr",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Get all built-in rules
pub fn builtin_rules() -> Vec<Rule> {
    let mut rules = Vec::new();
    rules.extend(linux_rules());
    rules.extend(windows_rules());
    rules
}

/// A catalog holding only the built-in rules
pub fn builtin_catalog() -> Result<RuleCatalog> {
    let mut catalog = RuleCatalog::new();
    for rule in builtin_rules() {
        catalog.register(rule)?;
    }
    Ok(catalog)
}

/// Linux hardening rules
pub fn linux_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "RULE-101",
            "Disable SSH root login",
            Severity::High,
            OsType::Linux,
            ValueSchema::Boolean,
        )
        .with_description("PermitRootLogin must be disabled in sshd_config")
        .with_setting("sshd.permit_root_login")
        .with_default(false),
        Rule::new(
            "RULE-102",
            "Disable SSH password authentication",
            Severity::Medium,
            OsType::Linux,
            ValueSchema::Boolean,
        )
        .with_description("PasswordAuthentication should be disabled in favor of keys")
        .with_setting("sshd.password_authentication")
        .with_default(false),
        Rule::new(
            "RULE-110",
            "SSH approved ciphers",
            Severity::Low,
            OsType::Linux,
            ValueSchema::List {
                allowed: strings(SSH_CIPHERS),
            },
        )
        .with_description("sshd may only offer ciphers from the approved list")
        .with_setting("sshd.ciphers")
        .with_default(SettingValue::List(strings(SSH_CIPHERS))),
        Rule::new(
            "RULE-205",
            "Password maximum age",
            Severity::Medium,
            OsType::Linux,
            ValueSchema::IntegerRange {
                min: Some(1),
                max: Some(99999),
            },
        )
        .with_description("PASS_MAX_DAYS in /etc/login.defs must force periodic rotation")
        .with_setting("login_defs.pass_max_days")
        .with_default(ExpectedValue::range(Some(1), Some(365))),
        Rule::new(
            "RULE-206",
            "Password minimum length",
            Severity::Medium,
            OsType::Linux,
            ValueSchema::IntegerRange {
                min: Some(1),
                max: Some(128),
            },
        )
        .with_description("pam_pwquality minlen")
        .with_setting("pwquality.minlen")
        .with_default(ExpectedValue::range(Some(14), None)),
        Rule::new(
            "RULE-301",
            "Disable IP forwarding",
            Severity::Medium,
            OsType::Linux,
            ValueSchema::Boolean,
        )
        .with_description("net.ipv4.ip_forward must be 0 on non-router hosts")
        .with_setting("sysctl.net.ipv4.ip_forward")
        .with_default(false),
        Rule::new(
            "RULE-302",
            "Host firewall active",
            Severity::High,
            OsType::Linux,
            ValueSchema::Enum {
                options: strings(&["active", "inactive"]),
            },
        )
        .with_description("The host firewall service must be running")
        .with_setting("firewall.state")
        .with_default(SettingValue::from("active")),
        Rule::new(
            "RULE-310",
            "Restrict /etc/shadow permissions",
            Severity::High,
            OsType::Linux,
            ValueSchema::Text {
                pattern: Some(r"^0?[0-7]{3}$".to_string()),
            },
        )
        .with_setting("file_mode./etc/shadow")
        .with_default(SettingValue::from("0640")),
    ]
}

/// Windows hardening rules
pub fn windows_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "RULE-501",
            "Disable Guest account",
            Severity::High,
            OsType::Windows,
            ValueSchema::Boolean,
        )
        .with_description("The built-in Guest account must be disabled")
        .with_setting("account.guest_enabled")
        .with_default(false),
        Rule::new(
            "RULE-502",
            "Disable AutoPlay",
            Severity::Medium,
            OsType::Windows,
            ValueSchema::Enum {
                options: strings(&["enabled", "disabled"]),
            },
        )
        .with_description("AutoPlay must be disabled for all drives")
        .with_setting(r"HKLM\Software\Microsoft\Windows\CurrentVersion\Policies\Explorer\NoDriveTypeAutoRun")
        .with_default(SettingValue::from("disabled")),
        Rule::new(
            "RULE-503",
            "Windows Firewall enabled",
            Severity::High,
            OsType::Windows,
            ValueSchema::Boolean,
        )
        .with_description("Windows Firewall must be on for every profile")
        .with_setting("firewall.all_profiles_enabled")
        .with_default(true),
        Rule::new(
            "RULE-510",
            "Minimum password length",
            Severity::Medium,
            OsType::Windows,
            ValueSchema::IntegerRange {
                min: Some(0),
                max: Some(128),
            },
        )
        .with_description("MinimumPasswordLength in the local security policy")
        .with_setting("secpol.MinimumPasswordLength")
        .with_default(ExpectedValue::range(Some(14), None)),
    ]
}
