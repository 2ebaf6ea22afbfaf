use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// The dependency graph in DOT format.
    pub async fn graph(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<String> {
        let cmd = self.graph_cmd(ctx, opts).await?;
        self.run_output(ctx, cmd).await
    }

    pub(crate) async fn graph_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut plan = String::new();
        let mut draw_cycles = false;
        let mut graph_type = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::GraphPlan(v) => plan = v,
                Opt::DrawCycles(v) => draw_cycles = v,
                Opt::GraphType(v) => graph_type = v,
                other => common.absorb(other, "graph")?,
            }
        }

        let mut cmd = CommandBuilder::new(["graph"]);
        cmd.string_flag("plan", &plan)
            .switch("draw-cycles", draw_cycles)
            .string_flag("type", &graph_type);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}
