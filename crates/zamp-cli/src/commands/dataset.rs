use super::{print_json, EngineArgs};
use clap::Args;

#[derive(Args)]
pub struct DatasetMetadataCommand {
    #[command(flatten)]
    pub engine: EngineArgs,

    pub dataset_id: String,
}

impl DatasetMetadataCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let service = self.engine.service().await?;
            let metadata = service
                .get_dataset_metadata(&self.engine.context(), &self.dataset_id)
                .await;

            service.registry().close_all().await;
            print_json(&metadata?)
        })
    }
}

#[derive(Args)]
pub struct DatasetParentsCommand {
    #[command(flatten)]
    pub engine: EngineArgs,

    pub dataset_id: String,
}

impl DatasetParentsCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let service = self.engine.service().await?;
            let parents = service
                .get_dataset_parents(&self.engine.context(), &self.dataset_id)
                .await;

            service.registry().close_all().await;
            print_json(&parents?)
        })
    }
}
