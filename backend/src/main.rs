use std::path::PathBuf;
use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use http::StatusCode;
use record_storage::{DocumentRecord, DocumentStorage};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

use docvault::{
    attachments::{ad_hoc_request, AttachmentService, Upload},
    blob_access::{AccessError, AccessGrant, AccessMode, AccessUrlIssuer, SigningCredentials},
    blob_client::SharedKeyBlobClient,
    blob_ref::normalize,
    types::{AppError, BlobStoreConfig, Environment},
};

/// Operator tool for document file references and access URLs
#[derive(Parser, Debug)]
#[command(name = "docvault", about = "Resolve blob references and mint access URLs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the token-free URL of a reference
    Public {
        /// Full URL, `<container>/<name>` or bare name
        reference: String,
    },
    /// Mint a signed read URL for a reference
    Sign {
        /// Full URL, `<container>/<name>` or bare name
        reference: String,
        /// Force a download instead of inline display
        #[arg(long)]
        attachment: bool,
        /// Lifetime in hours, defaults to `SAS_HOURS`
        #[arg(long)]
        hours: Option<i64>,
        /// Filename for `Content-Disposition`
        #[arg(long)]
        filename: Option<String>,
        /// `Content-Type` the store should answer with
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Print a document record with a display-safe `fileUrl`
    Show {
        /// Document id
        id: String,
        /// Partition key
        pk: String,
    },
    /// Mint a download URL for a document, migrating its `blobPath` if needed
    Download {
        /// Document id
        id: String,
        /// Partition key
        pk: String,
        /// Force a download instead of inline display
        #[arg(long)]
        attachment: bool,
    },
    /// Attach a stored file to a document
    Attach {
        /// Document id
        id: String,
        /// Partition key
        pk: String,
        /// Full URL, `<container>/<name>` or bare name
        reference: String,
    },
    /// Upload a local file and attach it to a document
    Upload {
        /// Document id
        id: String,
        /// Partition key
        pk: String,
        /// Local file to upload
        file: PathBuf,
        /// Blob name, defaults to the local file name
        #[arg(long)]
        name: Option<String>,
        /// `Content-Type` stored with the blob
        #[arg(long, default_value = "application/pdf")]
        content_type: String,
        /// Filename for `Content-Disposition`
        #[arg(long)]
        download_name: Option<String>,
    },
}

const fn access_mode(attachment: bool) -> AccessMode {
    if attachment {
        AccessMode::Attachment
    } else {
        AccessMode::Inline
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let environment = Environment::from_env();

    // JSON logs for staging/production (Datadog), plain for development.
    // Logs go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
        .from_env_lossy();
    match environment {
        Environment::Production | Environment::Staging => {
            fmt()
                .json()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        Environment::Development { .. } => {
            fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    // Fail fast on configuration problems
    let config = Arc::new(environment.blob_store_config()?);
    let credentials = environment.signing_credentials()?;

    tracing::info!(
        account = config.account(),
        container = config.container(),
        endpoint = config.endpoint_base(),
        signing = credentials.is_some(),
        "Blob store configured"
    );

    match run(cli.command, &environment, &config, credentials.as_ref()).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            let (status, body) = e.into_response_parts();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "status": status.as_u16(), "body": body }))?
            );
            anyhow::bail!("request failed with status {status}")
        }
    }
}

/// What a command prints
#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Url { url: String },
    Grant(AccessGrant),
    Record(DocumentRecord),
    Upload {
        record: DocumentRecord,
        grant: AccessGrant,
    },
}

async fn attachment_service(
    environment: &Environment,
    config: &Arc<BlobStoreConfig>,
) -> Result<AttachmentService, AppError> {
    let table_name = environment.documents_table_name().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Document store is not configured",
            false,
        )
    })?;
    let dynamodb_client = Arc::new(DynamoDbClient::from_conf(
        environment.dynamodb_client_config().await,
    ));
    let storage = DocumentStorage::new(dynamodb_client, table_name);

    Ok(AttachmentService::new(Arc::new(storage), Arc::clone(config)))
}

async fn run(
    command: Commands,
    environment: &Environment,
    config: &Arc<BlobStoreConfig>,
    credentials: Option<&SigningCredentials>,
) -> Result<Output, AppError> {
    let issuer = AccessUrlIssuer::new(config);

    let output = match command {
        Commands::Public { reference } => Output::Url {
            url: issuer.public_url(&normalize(&reference, config)?),
        },
        Commands::Sign {
            reference,
            attachment,
            hours,
            filename,
            content_type,
        } => {
            let path = normalize(&reference, config)?;
            let mut request = ad_hoc_request(config, access_mode(attachment));
            if let Some(hours) = hours {
                // Out of range maps to zero, which the issuer rejects
                request = request.with_ttl(TimeDelta::try_hours(hours).unwrap_or_else(TimeDelta::zero));
            }
            if let Some(filename) = filename {
                request = request.with_filename(filename);
            }
            if let Some(content_type) = content_type {
                request = request.with_content_type(content_type);
            }
            Output::Grant(issuer.signed_url(credentials, &path, &request)?)
        }
        Commands::Show { id, pk } => {
            let service = attachment_service(environment, config).await?;
            Output::Record(service.get_record(&id, &pk).await?)
        }
        Commands::Download { id, pk, attachment } => {
            let service = attachment_service(environment, config).await?;
            Output::Grant(
                service
                    .download_grant(&id, &pk, credentials, access_mode(attachment))
                    .await?,
            )
        }
        Commands::Attach { id, pk, reference } => {
            let service = attachment_service(environment, config).await?;
            Output::Record(service.attach(&id, &pk, &reference).await?)
        }
        Commands::Upload {
            id,
            pk,
            file,
            name,
            content_type,
            download_name,
        } => {
            let credentials = credentials.ok_or_else(|| {
                AccessError::CredentialsUnavailable("uploads need an account key".to_string())
            })?;
            let object_name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let data = tokio::fs::read(&file).await.map_err(|e| {
                tracing::error!(file = %file.display(), "Failed to read upload: {e}");
                AppError::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_upload",
                    "The file could not be read",
                    false,
                )
            })?;

            let blobs = SharedKeyBlobClient::new(Arc::clone(config), credentials.clone())?;
            let service = attachment_service(environment, config)
                .await?
                .with_blob_writer(Arc::new(blobs));
            let upload = Upload {
                object_name,
                data,
                content_type,
                download_name,
            };
            let uploaded = service.upload(&id, &pk, upload, Some(credentials)).await?;

            Output::Upload {
                record: uploaded.record,
                grant: uploaded.grant,
            }
        }
    };

    Ok(output)
}
