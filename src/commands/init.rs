use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::version::V0_14_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

#[derive(Debug)]
struct InitConfig {
    backend: bool,
    backend_config: Vec<String>,
    dir: String,
    from_module: String,
    get: bool,
    get_plugins: bool,
    lock: bool,
    lock_timeout: String,
    lockfile: String,
    plugin_dirs: Vec<String>,
    reconfigure: bool,
    upgrade: bool,
    verify_plugins: bool,
    common: Common,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            backend: true,
            backend_config: Vec::new(),
            dir: String::new(),
            from_module: String::new(),
            get: true,
            get_plugins: true,
            lock: true,
            lock_timeout: "0s".into(),
            lockfile: String::new(),
            plugin_dirs: Vec::new(),
            reconfigure: false,
            upgrade: false,
            verify_plugins: true,
            common: Common::default(),
        }
    }
}

impl Session {
    /// `terraform init`.
    pub async fn init(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self.init_cmd(ctx, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn init_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut c = InitConfig::default();
        for opt in opts {
            match opt {
                Opt::Backend(v) => c.backend = v,
                Opt::BackendConfig(v) => c.backend_config.push(v),
                Opt::Dir(v) => c.dir = v,
                Opt::FromModule(v) => c.from_module = v,
                Opt::Get(v) => c.get = v,
                Opt::GetPlugins(v) => c.get_plugins = v,
                Opt::Lock(v) => c.lock = v,
                Opt::LockTimeout(v) => c.lock_timeout = v,
                Opt::Lockfile(v) => c.lockfile = v,
                Opt::PluginDir(v) => c.plugin_dirs.push(v),
                Opt::Reconfigure(v) => c.reconfigure = v,
                Opt::Upgrade(v) => c.upgrade = v,
                Opt::VerifyPlugins(v) => c.verify_plugins = v,
                other => c.common.absorb(other, "init")?,
            }
        }

        let mut cmd = CommandBuilder::new(["init"]);
        cmd.arg("-no-color")
            .arg("-force-copy")
            .arg("-input=false")
            .string_flag("from-module", &c.from_module)
            .string_flag("lock-timeout", &c.lock_timeout)
            .flag("backend", c.backend)
            .flag("get", c.get)
            .flag("upgrade", c.upgrade)
            .flag("lock", c.lock)
            .flag("get-plugins", c.get_plugins)
            .flag("verify-plugins", c.verify_plugins)
            .switch("reconfigure", c.reconfigure);

        if !c.lockfile.is_empty() {
            self.require_range(ctx, Some(&V0_14_0), None, "-lockfile")
                .await?;
            cmd.flag("lockfile", &c.lockfile);
        }

        cmd.repeated("backend-config", &c.backend_config)
            .repeated("plugin-dir", &c.plugin_dirs)
            .positional(&c.dir);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}
