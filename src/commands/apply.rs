//! `apply`, `destroy`, `plan` and `refresh`, which share most of their options.

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::version::{V0_15_2, V0_15_4};
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

#[derive(Debug)]
struct RunConfig {
    backup: String,
    destroy: bool,
    dir: String,
    lock: bool,
    lock_timeout: String,
    out: String,
    parallelism: u32,
    refresh: bool,
    refresh_only: bool,
    replace: Vec<String>,
    state: String,
    state_out: String,
    targets: Vec<String>,
    vars: Vec<String>,
    var_files: Vec<String>,
    common: Common,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backup: String::new(),
            destroy: false,
            dir: String::new(),
            lock: true,
            lock_timeout: "0s".into(),
            out: String::new(),
            parallelism: 10,
            refresh: true,
            refresh_only: false,
            replace: Vec::new(),
            state: String::new(),
            state_out: String::new(),
            targets: Vec::new(),
            vars: Vec::new(),
            var_files: Vec::new(),
            common: Common::default(),
        }
    }
}

/// Which options a subcommand takes beyond the shared ones.
#[derive(Clone, Copy)]
struct Accepts {
    command: &'static str,
    backup: bool,
    destroy: bool,
    out: bool,
    parallelism: bool,
    refresh: bool,
    refresh_only: bool,
    replace: bool,
    state_out: bool,
    dir_or_plan: bool,
}

const APPLY: Accepts = Accepts {
    command: "apply",
    backup: true,
    destroy: true,
    out: false,
    parallelism: true,
    refresh: true,
    refresh_only: true,
    replace: true,
    state_out: true,
    dir_or_plan: true,
};

const DESTROY: Accepts = Accepts {
    command: "destroy",
    backup: true,
    destroy: false,
    out: false,
    parallelism: true,
    refresh: true,
    refresh_only: false,
    replace: false,
    state_out: true,
    dir_or_plan: false,
};

const PLAN: Accepts = Accepts {
    command: "plan",
    backup: false,
    destroy: true,
    out: true,
    parallelism: true,
    refresh: true,
    refresh_only: true,
    replace: true,
    state_out: false,
    dir_or_plan: false,
};

const REFRESH: Accepts = Accepts {
    command: "refresh",
    backup: true,
    destroy: false,
    out: false,
    parallelism: false,
    refresh: false,
    refresh_only: false,
    replace: false,
    state_out: true,
    dir_or_plan: false,
};

fn collect(opts: impl IntoIterator<Item = Opt>, accepts: Accepts) -> Result<RunConfig> {
    let mut c = RunConfig::default();
    for opt in opts {
        match opt {
            Opt::Backup(v) if accepts.backup => c.backup = v,
            Opt::Destroy(v) if accepts.destroy => c.destroy = v,
            Opt::DirOrPlan(v) if accepts.dir_or_plan => c.dir = v,
            Opt::Dir(v) if !accepts.dir_or_plan => c.dir = v,
            Opt::Lock(v) => c.lock = v,
            Opt::LockTimeout(v) => c.lock_timeout = v,
            Opt::Out(v) if accepts.out => c.out = v,
            Opt::Parallelism(v) if accepts.parallelism => c.parallelism = v,
            Opt::Refresh(v) if accepts.refresh => c.refresh = v,
            Opt::RefreshOnly(v) if accepts.refresh_only => c.refresh_only = v,
            Opt::Replace(v) if accepts.replace => c.replace.push(v),
            Opt::State(v) => c.state = v,
            Opt::StateOut(v) if accepts.state_out => c.state_out = v,
            Opt::Target(v) => c.targets.push(v),
            Opt::Var(v) => c.vars.push(v),
            Opt::VarFile(v) => c.var_files.push(v),
            other => c.common.absorb(other, accepts.command)?,
        }
    }
    Ok(c)
}

impl Session {
    /// `terraform apply`. Pass [`Opt::DirOrPlan`] to apply a saved plan.
    pub async fn apply(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self.apply_cmd(ctx, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn apply_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let c = collect(opts, APPLY)?;

        let mut cmd = CommandBuilder::new(["apply"]);
        cmd.arg("-no-color")
            .arg("-auto-approve")
            .arg("-input=false")
            .string_flag("backup", &c.backup)
            .string_flag("lock-timeout", &c.lock_timeout)
            .string_flag("state", &c.state)
            .string_flag("state-out", &c.state_out)
            .repeated("var-file", &c.var_files)
            .flag("lock", c.lock)
            .flag("parallelism", c.parallelism)
            .flag("refresh", c.refresh);

        if c.refresh_only {
            self.require_range(ctx, Some(&V0_15_4), None, "-refresh-only")
                .await?;
            cmd.arg("-refresh-only");
        }
        if c.destroy {
            self.require_range(ctx, Some(&V0_15_2), None, "-destroy")
                .await?;
            cmd.arg("-destroy");
        }
        if !c.replace.is_empty() {
            self.require_range(ctx, Some(&V0_15_2), None, "-replace")
                .await?;
            cmd.repeated("replace", &c.replace);
        }

        cmd.repeated("target", &c.targets)
            .vars(&c.vars)
            .positional(&c.dir);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    /// `terraform destroy`.
    pub async fn destroy(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self.destroy_cmd(ctx, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn destroy_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let c = collect(opts, DESTROY)?;

        let mut cmd = CommandBuilder::new(["destroy"]);
        cmd.arg("-no-color")
            .arg("-auto-approve")
            .arg("-input=false")
            .string_flag("backup", &c.backup)
            .string_flag("lock-timeout", &c.lock_timeout)
            .string_flag("state", &c.state)
            .string_flag("state-out", &c.state_out)
            .repeated("var-file", &c.var_files)
            .flag("lock", c.lock)
            .flag("parallelism", c.parallelism)
            .flag("refresh", c.refresh);
        cmd.repeated("target", &c.targets)
            .vars(&c.vars)
            .positional(&c.dir);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    /// `terraform plan -detailed-exitcode`. Returns whether the plan has changes.
    pub async fn plan(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<bool> {
        let mut cmd = self.plan_cmd(ctx, opts).await?;
        cmd.discard_stdout();
        let done = self.execute(ctx, cmd).await?;
        if done.code() == Some(2) {
            return Ok(true);
        }
        done.into_stdout().map(|_| false)
    }

    pub(crate) async fn plan_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let c = collect(opts, PLAN)?;

        let mut cmd = CommandBuilder::new(["plan"]);
        cmd.arg("-no-color")
            .arg("-input=false")
            .arg("-detailed-exitcode")
            .string_flag("lock-timeout", &c.lock_timeout)
            .string_flag("out", &c.out)
            .string_flag("state", &c.state)
            .repeated("var-file", &c.var_files)
            .flag("lock", c.lock)
            .flag("parallelism", c.parallelism)
            .flag("refresh", c.refresh);

        if c.refresh_only {
            self.require_range(ctx, Some(&V0_15_4), None, "-refresh-only")
                .await?;
            cmd.arg("-refresh-only");
        }
        if !c.replace.is_empty() {
            self.require_range(ctx, Some(&V0_15_2), None, "-replace")
                .await?;
            cmd.repeated("replace", &c.replace);
        }

        cmd.switch("destroy", c.destroy)
            .repeated("target", &c.targets)
            .vars(&c.vars)
            .positional(&c.dir);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    /// `terraform refresh`.
    pub async fn refresh(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self.refresh_cmd(ctx, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn refresh_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let c = collect(opts, REFRESH)?;

        let mut cmd = CommandBuilder::new(["refresh"]);
        cmd.arg("-no-color")
            .arg("-input=false")
            .string_flag("backup", &c.backup)
            .string_flag("lock-timeout", &c.lock_timeout)
            .string_flag("state", &c.state)
            .string_flag("state-out", &c.state_out)
            .repeated("var-file", &c.var_files)
            .flag("lock", c.lock)
            .repeated("target", &c.targets)
            .vars(&c.vars)
            .positional(&c.dir);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}
