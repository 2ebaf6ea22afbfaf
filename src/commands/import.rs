use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

#[derive(Debug)]
struct ImportConfig {
    allow_missing_config: bool,
    backup: String,
    config: String,
    lock: bool,
    lock_timeout: String,
    state: String,
    state_out: String,
    vars: Vec<String>,
    var_files: Vec<String>,
    common: Common,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            allow_missing_config: false,
            backup: String::new(),
            config: String::new(),
            lock: true,
            lock_timeout: "0s".into(),
            state: String::new(),
            state_out: String::new(),
            vars: Vec::new(),
            var_files: Vec::new(),
            common: Common::default(),
        }
    }
}

impl Session {
    /// Bring the existing object `id` under management as `address`.
    pub async fn import(
        &self,
        ctx: &Context,
        address: &str,
        id: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.import_cmd(ctx, address, id, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn import_cmd(
        &self,
        ctx: &Context,
        address: &str,
        id: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut c = ImportConfig::default();
        for opt in opts {
            match opt {
                Opt::AllowMissingConfig(v) => c.allow_missing_config = v,
                Opt::Backup(v) => c.backup = v,
                Opt::Config(v) => c.config = v,
                Opt::Lock(v) => c.lock = v,
                Opt::LockTimeout(v) => c.lock_timeout = v,
                Opt::State(v) => c.state = v,
                Opt::StateOut(v) => c.state_out = v,
                Opt::Var(v) => c.vars.push(v),
                Opt::VarFile(v) => c.var_files.push(v),
                other => c.common.absorb(other, "import")?,
            }
        }

        let mut cmd = CommandBuilder::new(["import"]);
        cmd.arg("-no-color")
            .arg("-input=false")
            .string_flag("backup", &c.backup)
            .string_flag("config", &c.config)
            .string_flag("lock-timeout", &c.lock_timeout)
            .string_flag("state", &c.state)
            .string_flag("state-out", &c.state_out)
            .repeated("var-file", &c.var_files)
            .flag("lock", c.lock)
            .switch("allow-missing-config", c.allow_missing_config)
            .vars(&c.vars)
            .positional(address)
            .positional(id);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}
