use ec_export::ExportOptions;
use ec_sink::SinkKind;
use ep_record::EntityType;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct ExportParams {
    /// Comma-separated entity types to export. Available: block, transaction,
    /// receipt, log, token_transfer, trace, geth_trace, contract, token,
    /// internal_transfer, token_balance, native_balance, error.
    #[arg(
        env = "ETHETL_ENTITY_TYPES",
        long,
        short = 't',
        value_delimiter = ',',
        default_value = "block,transaction,log,token_transfer,error"
    )]
    pub entity_types: Vec<EntityType>,

    /// Drop transactions whose receipt the node does not return, instead of
    /// exporting them with empty receipt fields.
    #[clap(env = "ETHETL_SKIP_NONE_RECEIPTS", long)]
    pub skip_none_receipts: bool,

    /// Comma-separated sinks, each `console` or `file:<path>`. Every record
    /// is written to every sink.
    #[arg(env = "ETHETL_SINKS", long = "sink", short = 'o', value_delimiter = ',', default_value = "console")]
    pub sinks: Vec<SinkKind>,
}

impl ExportParams {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions { skip_none_receipts: self.skip_none_receipts }
    }
}
