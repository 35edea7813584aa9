use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rentconnect::api::types::{Partner, PropertyRef, ViewingStatus};
use rentconnect::store::conversations::{NewConversation, StartedConversation};
use rentconnect::store::favorites::FavoriteSort;
use rentconnect::store::thread::{MessageId, ThreadMessage};
use rentconnect::store::viewings::today;
use rentconnect::view::{self, ConversationCard, Side};
use rentconnect::{ApiError, ClientConfig, ErrorCode, HttpGateway, SendFailure, Session};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing credential; pass --token or set RENTCONNECT_TOKEN")]
    MissingToken,
    #[error("missing user id; pass --user-id or set RENTCONNECT_USER_ID")]
    MissingUserId,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Send(#[from] SendFailure),
}

#[derive(Parser, Debug)]
#[command(name = "rentconnect", about = "RentConnect messaging client")]
struct Cli {
    #[arg(long, env = "RENTCONNECT_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "RENTCONNECT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, env = "RENTCONNECT_USER_ID")]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List conversations, most recent first.
    Conversations {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one conversation's messages.
    Thread {
        conversation_id: String,
        /// Keep polling and print new messages until Ctrl-C.
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
    /// Send a message to an existing conversation.
    Send { conversation_id: String, text: String },
    /// Message a landlord about a listing, reusing any existing conversation.
    Start(StartArgs),
    Favorites(FavoritesCommand),
    Viewings(ViewingsCommand),
}

#[derive(Args, Debug)]
struct StartArgs {
    #[arg(long)]
    property_id: String,
    #[arg(long)]
    property_title: String,
    #[arg(long)]
    landlord_id: String,
    #[arg(long)]
    landlord_name: String,
    text: String,
}

#[derive(Args, Debug)]
struct FavoritesCommand {
    #[command(subcommand)]
    command: FavoritesSubcommand,
}

#[derive(Subcommand, Debug)]
enum FavoritesSubcommand {
    List {
        /// Property type, or `all`.
        #[arg(long = "type")]
        property_type: Option<String>,
        /// recent, price-low or price-high.
        #[arg(long, default_value = "recent")]
        sort: String,
    },
    Add {
        property_id: String,
    },
    Remove {
        property_id: String,
    },
}

#[derive(Args, Debug)]
struct ViewingsCommand {
    #[command(subcommand)]
    command: ViewingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ViewingsSubcommand {
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Cancel {
        id: String,
    },
    Approve {
        id: String,
    },
    Reject {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    config.token = Some(cli.token.or(config.token).ok_or(CliError::MissingToken)?);
    let user_id = cli.user_id.or_else(|| config.user_id.clone()).ok_or(CliError::MissingUserId)?;

    let gateway = HttpGateway::new(&config)?;
    tracing::debug!(base_url = gateway.base_url(), %user_id, "session starting");
    let session = Session::new(Arc::new(gateway), user_id, config.poll_interval);

    let result = match cli.command {
        Command::Conversations { search } => run_conversations(&session, search.as_deref()).await,
        Command::Thread { conversation_id, watch } => run_thread(&session, &conversation_id, watch).await,
        Command::Send { conversation_id, text } => run_send(&session, &conversation_id, &text).await,
        Command::Start(args) => run_start(&session, args).await,
        Command::Favorites(favorites) => run_favorites(&session, favorites).await,
        Command::Viewings(viewings) => run_viewings(&session, viewings).await,
    };
    session.sign_out();
    if let Err(e) = &result {
        report(e);
    }
    result
}

fn report(e: &CliError) {
    match e {
        CliError::Api(err) if err.requires_reauth() => {
            tracing::error!(code = err.error_code(), "credential rejected; sign in again");
        }
        CliError::Api(err) => tracing::error!(code = err.error_code(), retryable = err.retryable(), "{err}"),
        CliError::Send(failure) => {
            tracing::error!(code = failure.error_code(), retryable = failure.retryable(), text = %failure.content, "{failure}");
        }
        _ => {}
    }
}

// =============================================================================
// MESSAGING
// =============================================================================

async fn run_conversations(session: &Session, search: Option<&str>) -> Result<(), CliError> {
    session.load().await?;
    let now = Utc::now();
    let list = session.conversations().search(search.unwrap_or_default());
    for conv in &list {
        let card = ConversationCard::new(conv, now);
        let badge = card.unread.map(|n| format!(" ({n} unread)")).unwrap_or_default();
        let tick = if card.verified { " ✓" } else { "" };
        println!("{}  {}{tick} · {}{badge}", card.conversation_id, card.partner_name, card.property_title);
        println!("    {}  {}", card.time_label, card.preview);
    }
    println!("{} conversations, {} unread", list.len(), session.conversations().total_unread());
    Ok(())
}

async fn run_thread(session: &Session, conversation_id: &str, watch: bool) -> Result<(), CliError> {
    session.open_conversation(conversation_id).await?;
    let mut seen = HashSet::new();
    print_new(&session.thread().messages(), session.user_id(), &mut seen);
    if !watch {
        return Ok(());
    }

    let poll = session.thread().clone();
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => print_new(&poll.messages(), session.user_id(), &mut seen),
        }
    }
    session.close_conversation();
    Ok(())
}

async fn run_send(session: &Session, conversation_id: &str, text: &str) -> Result<(), CliError> {
    session.open_conversation(conversation_id).await?;
    let sent = session.send(text).await?;
    println!("sent {} at {}", display_id(&sent.id), sent.created_at.format("%Y-%m-%d %H:%M"));
    Ok(())
}

async fn run_start(session: &Session, args: StartArgs) -> Result<(), CliError> {
    session.load().await?;
    let request = NewConversation {
        property: PropertyRef {
            id: args.property_id,
            title: args.property_title,
            location: None,
            price: None,
            images: Vec::new(),
        },
        partner: Partner { id: args.landlord_id, name: args.landlord_name, avatar_url: None, verified: false },
        initial_message: args.text,
    };
    match session.start_conversation(request).await? {
        StartedConversation::Created { conversation_id } => println!("created {conversation_id}"),
        StartedConversation::Existing { conversation_id } => println!("already talking: {conversation_id}"),
    }
    Ok(())
}

fn print_new(messages: &[ThreadMessage], user_id: &str, seen: &mut HashSet<MessageId>) {
    for bubble in view::bubbles(messages, user_id) {
        if bubble.pending || !seen.insert(bubble.message.id.clone()) {
            continue;
        }
        let who = match bubble.side {
            Side::Own => "you",
            Side::Partner => "them",
        };
        println!("[{}] {who}: {}", bubble.message.created_at.format("%Y-%m-%d %H:%M"), bubble.message.content);
    }
}

fn display_id(id: &MessageId) -> String {
    match id {
        MessageId::Confirmed(id) => id.clone(),
        MessageId::Pending(n) => format!("local-{n}"),
    }
}

// =============================================================================
// FAVORITES
// =============================================================================

async fn run_favorites(session: &Session, favorites: FavoritesCommand) -> Result<(), CliError> {
    let store = session.favorites();
    store.load().await?;
    match favorites.command {
        FavoritesSubcommand::List { property_type, sort } => {
            let sort: FavoriteSort = sort.parse().map_err(CliError::InvalidArgument)?;
            for fav in store.view(property_type.as_deref(), sort) {
                let (title, price) = fav
                    .property
                    .as_ref()
                    .map(|p| (p.title.as_str(), p.price))
                    .unwrap_or((fav.property_id.as_str(), None));
                let price = price.map(|p| format!("{p:.0}")).unwrap_or_else(|| "-".to_owned());
                println!("{}  {title}  {price}", fav.property_id);
            }
        }
        FavoritesSubcommand::Add { property_id } => {
            let added = store.add(&property_id, None).await?;
            println!("{}", if added { "saved" } else { "already saved" });
        }
        FavoritesSubcommand::Remove { property_id } => {
            let removed = store.remove(&property_id).await?;
            println!("{}", if removed { "removed" } else { "not saved" });
        }
    }
    Ok(())
}

// =============================================================================
// VIEWINGS
// =============================================================================

async fn run_viewings(session: &Session, viewings: ViewingsCommand) -> Result<(), CliError> {
    let store = session.viewings();
    match viewings.command {
        ViewingsSubcommand::List { status } => {
            let status = status
                .map(|s| s.parse::<ViewingStatus>())
                .transpose()
                .map_err(CliError::InvalidArgument)?;
            store.load(status).await?;
            let groups = store.grouped(today());
            for (label, items) in [("Upcoming", &groups.upcoming), ("Pending", &groups.pending), ("Past", &groups.past)] {
                if items.is_empty() {
                    continue;
                }
                println!("{label}:");
                for r in items {
                    println!(
                        "  {}  {}  {} ({})  {}",
                        r.id,
                        r.preferred_date,
                        r.time_slot.hours(),
                        r.status.as_str(),
                        r.landlord_notes.as_deref().unwrap_or_default()
                    );
                }
            }
        }
        ViewingsSubcommand::Cancel { id } => print_status(&store.cancel(&id).await?.status),
        ViewingsSubcommand::Approve { id } => print_status(&store.approve(&id).await?.status),
        ViewingsSubcommand::Reject { id, reason } => {
            print_status(&store.reject(&id, reason.as_deref()).await?.status);
        }
    }
    Ok(())
}

fn print_status(status: &ViewingStatus) {
    println!("{}", status.as_str());
}
