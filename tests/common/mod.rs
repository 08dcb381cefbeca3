use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

pub fn run_kakeibo(args: &[&str]) -> Output {
    TestEnv::new().run(args)
}

pub struct TestEnv {
    home: TempDir,
    config: TempDir,
    data: TempDir,
    ledger: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("create temporary HOME dir"),
            config: tempfile::tempdir().expect("create temporary XDG config dir"),
            data: tempfile::tempdir().expect("create temporary XDG data dir"),
            ledger: tempfile::tempdir().expect("create temporary ledger dir"),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    /// Run with extra environment variables set after the isolation ones
    pub fn run_with_env(&self, args: &[&str], vars: &[(&str, &str)]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_kakeibo"))
            .args(args)
            .current_dir(self.home.path())
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.config.path())
            .env("XDG_DATA_HOME", self.data.path())
            .env_remove("KAKEIBO_CONFIG")
            .env_remove("KAKEIBO_LLM_API_KEY")
            .env_remove("KAKEIBO_LLM_ENDPOINT")
            .env_remove("KAKEIBO_ANALYZER_API_KEY")
            .env_remove("KAKEIBO_ANALYZER_ENDPOINT")
            .env_remove("KAKEIBO_SMTP_USER")
            .env_remove("KAKEIBO_SMTP_PASSWORD")
            .env_remove("RUST_LOG")
            .envs(vars.iter().copied())
            .output()
            .expect("failed to execute kakeibo binary")
    }

    #[allow(dead_code)]
    pub fn home(&self) -> &Path {
        self.home.path()
    }

    /// Data directory used once [`TestEnv::use_ledger_dir`] has run
    #[allow(dead_code)]
    pub fn ledger_dir(&self) -> &Path {
        self.ledger.path()
    }

    #[allow(dead_code)]
    pub fn config_path(&self) -> PathBuf {
        let output = self.run(&["config", "path"]);
        assert!(
            output.status.success(),
            "config path should succeed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );

        let path = String::from_utf8_lossy(&output.stdout);
        PathBuf::from(path.trim())
    }

    #[allow(dead_code)]
    pub fn write_config(&self, contents: &str) {
        let config_path = self.config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).expect("create config parent directory");
        }
        std::fs::write(&config_path, contents).expect("write config file");
    }

    /// Point `general.data_dir` at the temporary ledger directory
    #[allow(dead_code)]
    pub fn use_ledger_dir(&self) {
        self.write_config(&format!(
            "[general]\ndata_dir = {:?}\n",
            self.ledger.path().display().to_string()
        ));
    }

    /// Write a month's item ledger under the ledger directory
    #[allow(dead_code)]
    pub fn write_ledger_csv(&self, year: i32, month: u32, rows: &[(&str, i64)]) {
        let dir = self.ledger.path().join("output").join("csv").join(year.to_string());
        std::fs::create_dir_all(&dir).expect("create ledger year dir");

        let mut content = String::from(
            "receipt_id,date,time,merchant_name,item_name,item_tag,item_tag_reason,total_price_yen,unit_price_yen,quantity,source_file,json_file\n",
        );
        for (idx, (tag, price)) in rows.iter().enumerate() {
            content.push_str(&format!(
                "r{idx},{year}-{month:02}-01,,shop,item{idx},{tag},,{price},,,img.jpg,r{idx}.json\n"
            ));
        }

        std::fs::write(dir.join(format!("{year}{month:02}_items.csv")), content)
            .expect("write ledger csv");
    }
}
