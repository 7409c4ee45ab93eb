#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must either fail to parse or validate; it must never panic,
// and anything that validates must convert into runtime configs.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = toml::from_str::<sprayer_config::Config>(data)
        && cfg.validate().is_ok()
    {
        let _ = sprayer_core::SchedulerCfg::from(&cfg);
        let _ = sprayer_core::ActuatorCfg::from(&cfg.sprinkler);
        let policy = sprayer_core::policy::from_cfg(&sprayer_core::PolicyCfg::from(&cfg.policy));
        assert!(policy.decide(0.0).is_ok());
    }
});
