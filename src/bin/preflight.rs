use records_ledger_gateway::domain::decode::{decode_payload, DecodedResponse};
use anyhow::Context;
use records_ledger_gateway::domain::{describe_failure, ErrorChain};
use records_ledger_gateway::infra::fabric::load_identity;
use records_ledger_gateway::infra::logging::init_tracing;
use records_ledger_gateway::transport::http::handlers::records::OP_GET_LATEST_RECORD;
use records_ledger_gateway::{FabricSessionFactory, GatewayConfig, GatewayError, SessionFactory, TransactionRequest};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--probe <patient id>]\n\
         \n\
         Requires env vars:\n\
           FABRIC_CHANNEL, FABRIC_CHAINCODE, FABRIC_MSP_ID, FABRIC_CRYPTO_PATH,\n\
           FABRIC_PEER_ENDPOINT, FABRIC_TLS_CERT_PATH\n\
         Optional:\n\
           FABRIC_PEER_HOST_ALIAS, FABRIC_USER_MSP_DIR,\n\
           FABRIC_TLS_CLIENT_CERT_PATH + FABRIC_TLS_CLIENT_KEY_PATH\n"
    );
    std::process::exit(2);
}

/// Keeps the full classified message when surfacing a gateway error to the operator.
fn explain(e: GatewayError) -> anyhow::Error {
    anyhow::anyhow!(describe_failure(&e))
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        let err: &(dyn std::error::Error + 'static) = e.as_ref();
        eprintln!("> Preflight FAILED: {}", describe_failure(&ErrorChain(err)));
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let probe = match args.iter().position(|a| a == "--probe") {
        Some(i) => match args.get(i + 1) {
            Some(id) => Some(id.clone()),
            None => usage_and_exit(),
        },
        None => None,
    };

    let config = GatewayConfig::from_env()
        .map_err(explain)
        .context("reading configuration")?;
    let settings = config
        .peer
        .require()
        .map_err(explain)
        .context("checking peer settings")?;

    println!("> Preflight:");
    println!("  FABRIC_CHANNEL={}", config.target.channel);
    println!("  FABRIC_CHAINCODE={}", config.target.chaincode);
    println!("  FABRIC_MSP_ID={}", settings.msp_id);
    println!("  FABRIC_PEER_ENDPOINT={} (TLS name {})", settings.peer_endpoint, settings.host_alias);
    println!("  signcerts: {}", settings.signcerts_dir().display());
    println!("  keystore:  {}", settings.keystore_dir().display());

    let identity = load_identity(&settings)
        .await
        .map_err(explain)
        .context("loading signing identity")?;
    println!(
        "  Identity loaded for {} ({} certificate bytes).",
        identity.msp_id,
        identity.certificate.len()
    );

    let factory = FabricSessionFactory::new(config.peer.clone());
    let session = factory
        .open()
        .await
        .map_err(explain)
        .context("opening ledger session")?;
    println!("  Peer connection established.");

    let outcome = match &probe {
        Some(patient_id) => {
            let contract = session
                .network(&config.target.channel)
                .contract(&config.target.chaincode);
            let tx = TransactionRequest::new(OP_GET_LATEST_RECORD).arg(patient_id.as_str());
            contract.evaluate(&tx).await.map(Some)
        }
        None => Ok(None),
    };
    session.close();

    match outcome.map_err(explain).context("probe read")? {
        Some(payload) => match decode_payload(&payload) {
            DecodedResponse::Structured(value) => {
                println!("  Probe {} returned JSON: {}", OP_GET_LATEST_RECORD, value);
            }
            DecodedResponse::Unstructured { parse_error, .. } => {
                eprintln!("  Warning: probe returned non-JSON output ({})", parse_error);
            }
        },
        None => println!("  No probe requested (use --probe <patient id> to evaluate a read)."),
    }

    println!("> Preflight OK.");
    Ok(())
}
