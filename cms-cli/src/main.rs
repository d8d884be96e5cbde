use clap::{Args, Parser, ValueEnum};
use cms_client::editor::{EditorConfig, EditorContext, EditorMode, Field, PostEditor, SaveAction};
use cms_client::settings::SettingsController;
use cms_client::ui::{Navigator, Notifier};
use cms_client::{CmsClientHttp, Post};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Cli {
    #[clap(short, long, env = "CMS_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    Register {
        #[clap(long)]
        username: Option<String>,
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
    },
    Login {
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
    },
    Logout,
    /// Show the signed-in account.
    Whoami,
    SetUsername {
        username: String,
    },
    /// Published posts.
    Posts {
        #[clap(long)]
        limit: Option<u32>,
        #[clap(long)]
        offset: Option<u32>,
    },
    /// Your posts, drafts included.
    Mine,
    Get {
        id: Uuid,
    },
    /// Write a new post.
    Write {
        #[clap(flatten)]
        fields: PostFields,
        #[clap(long, value_enum, default_value_t = Action::Draft)]
        action: Action,
    },
    /// Change one of your posts; only the given fields change.
    Edit {
        id: Uuid,
        #[clap(flatten)]
        fields: PostFields,
        #[clap(long, value_enum, default_value_t = Action::Draft)]
        action: Action,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct PostFields {
    #[clap(long)]
    title: Option<String>,
    #[clap(long)]
    content: Option<String>,
    #[clap(long)]
    category: Option<String>,
    #[clap(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,
    #[clap(long)]
    image: Option<String>,
    /// Local time, YYYY-MM-DDTHH:MM.
    #[clap(long)]
    scheduled_for: Option<String>,
}

impl PostFields {
    fn apply_to(self, editor: &PostEditor) {
        let updates = [
            self.title.map(Field::Title),
            self.content.map(Field::Content),
            self.category.map(Field::Category),
            self.tags.map(Field::Tags),
            self.image.map(Field::FeaturedImage),
            self.scheduled_for.map(Field::ScheduledFor),
        ];
        for field in updates.into_iter().flatten() {
            editor.update_field(field);
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Action {
    Draft,
    Publish,
    Schedule,
}

struct Console;

impl Notifier for Console {
    fn success(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

impl Navigator for Console {
    fn push(&self, route: &str) {
        println!("next: {route}");
    }
}

fn print_posts(posts: &[Post]) {
    if posts.is_empty() {
        println!("no posts");
    }
    for post in posts {
        println!("{post}");
    }
}

async fn run_editor(
    client: Arc<CmsClientHttp>,
    initial: Option<Post>,
    fields: PostFields,
    action: Action,
) -> ExitCode {
    let mode = if initial.is_some() {
        EditorMode::Edit
    } else {
        EditorMode::Create
    };
    let console = Arc::new(Console);
    let ctx = EditorContext {
        store: client,
        notifier: console.clone(),
        navigator: console,
    };
    let editor = PostEditor::mount(mode, initial.as_ref(), ctx, EditorConfig::default());
    fields.apply_to(&editor);

    let result = match action {
        Action::Draft => editor.save(SaveAction::Draft, false).await,
        Action::Publish => editor.save(SaveAction::Publish, false).await,
        Action::Schedule => editor.schedule().await,
    };
    editor.unmount();

    match result {
        Ok(id) => {
            println!("id: {id}");
            ExitCode::SUCCESS
        }
        // already reported through the console notifier
        Err(_) => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Cli::parse();
    debug!(server = %args.server, "connecting");
    let client = Arc::new(CmsClientHttp::connect(&args.server).await?);

    match args.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            client
                .register(username.as_deref(), &email, &password)
                .await?;
            println!("registered as {email}");
        }
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
            println!("logged in as {email}");
        }
        Command::Logout => {
            client.logout().await?;
            println!("logged out");
        }
        Command::Whoami => {
            let settings = SettingsController::new(client.clone(), Arc::new(Console));
            let username = settings.load().await?;
            if username.is_empty() {
                println!("no username set");
            } else {
                println!("{username}");
            }
        }
        Command::SetUsername { username } => {
            let settings = SettingsController::new(client.clone(), Arc::new(Console));
            if settings.submit(&username).await.is_err() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Posts { limit, offset } => {
            print_posts(&client.list_posts(limit, offset).await?);
        }
        Command::Mine => {
            print_posts(&client.my_posts().await?);
        }
        Command::Get { id } => {
            let post = client.get_post(id).await?;
            println!("{post}");
            println!("{}", post.content);
        }
        Command::Write { fields, action } => {
            return Ok(run_editor(client, None, fields, action).await);
        }
        Command::Edit { id, fields, action } => {
            let post = client.my_post(id).await?;
            return Ok(run_editor(client, Some(post), fields, action).await);
        }
        Command::Delete { id } => {
            client.delete_post(id).await?;
            println!("deleted {id}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
