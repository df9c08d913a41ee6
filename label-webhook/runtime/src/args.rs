use crate::{admission::Admission, metrics::AdmissionMetrics};
use anyhow::{bail, Result};
use clap::Parser;
use label_webhook_core::{Decoders, Engine, LabelPolicy, PatchMode};
use prometheus_client::registry::Registry;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "label-webhook",
    about = "A mutating admission webhook that enforces workload labels"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "label_webhook=info,warn",
        env = "LABEL_WEBHOOK_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The HTTP path on which admission reviews are served.
    #[clap(long, default_value = Admission::DEFAULT_PATH)]
    admission_path: String,

    /// The label that workloads may only set to `--policy-label-value`.
    #[clap(long, default_value = LabelPolicy::DEFAULT_KEY)]
    policy_label_key: String,

    #[clap(long, default_value = LabelPolicy::DEFAULT_VALUE)]
    policy_label_value: String,

    /// Either `compatible`, which only annotates admitted objects, or
    /// `pod-labels`, which also sets the policy label on pods.
    #[clap(long, default_value = "compatible")]
    patch_mode: PatchMode,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_path,
            policy_label_key,
            policy_label_value,
            patch_mode,
        } = self;

        if !admission_path.starts_with('/') {
            bail!("--admission-path must begin with '/': {admission_path:?}");
        }

        let mut prom = <Registry>::default();
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        let policy = LabelPolicy::new(policy_label_key, policy_label_value);
        info!(
            key = %policy.key,
            value = %policy.value,
            %patch_mode,
            path = %admission_path,
            "Serving admission reviews"
        );
        let engine = Engine::new(Decoders::default(), policy, patch_mode);
        let admission = Admission::new(engine, admission_path, metrics);

        let runtime = runtime.spawn_server(admission);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
