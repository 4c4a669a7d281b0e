use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use audiostation_api::types::{AdditionalField, SongFilter};
use audiostation_api::{
    AudioStationClient, AudioStationError, ClientConfig, Credentials, Page, TranscodeMode,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "audiostation",
    version,
    about = "Synology Audio Station command-line client"
)]
struct Cli {
    #[command(flatten)]
    connection: Connection,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Connection {
    /// Config file (default: ~/.config/audiostation/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// DSM address, e.g. `https://nas.local:5001`
    #[arg(long, global = true, env = "AUDIOSTATION_URL")]
    url: Option<String>,
    #[arg(short, long, global = true, env = "AUDIOSTATION_ACCOUNT")]
    account: Option<String>,
    #[arg(short, long, global = true, env = "AUDIOSTATION_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// 2-step verification code
    #[arg(long, global = true)]
    otp: Option<String>,
    /// Only the personal music folder
    #[arg(long, global = true)]
    personal: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List the Audio Station APIs the server offers
    Apis,
    /// List songs
    Songs {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        genre: Option<String>,
    },
    /// List albums
    Albums {
        #[command(flatten)]
        page: PageArgs,
        /// Only albums by this artist
        #[arg(long)]
        artist: Option<String>,
    },
    /// List artists
    Artists {
        #[command(flatten)]
        page: PageArgs,
    },
    /// List playlists
    Playlists {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show a playlist and its songs
    Playlist {
        id: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Search albums, artists and songs
    Search { keyword: String },
    /// Save cover art to a file
    Cover {
        /// Artist (album artist with --album)
        artist: String,
        #[arg(long)]
        album: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Download a song (Ctrl-C stops the transfer)
    Stream {
        song_id: String,
        #[arg(short, long, default_value = "original")]
        mode: ModeArg,
        /// Start position in seconds
        #[arg(long, default_value = "0")]
        position: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rate a song from 0 to 5
    Rate { song_id: String, rating: u8 },
    /// Show the tags stored in music files
    Tags {
        /// Share paths, e.g. `/music/Blue/01.flac`
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Args)]
struct PageArgs {
    /// Max results
    #[arg(short, long, default_value = "50")]
    limit: u32,
    #[arg(long, default_value = "0")]
    offset: u32,
}

impl From<PageArgs> for Page {
    fn from(p: PageArgs) -> Self {
        Page::new(p.limit, p.offset)
    }
}

#[derive(Clone, ValueEnum)]
enum ModeArg {
    Original,
    Mp3_128,
    Mp3_192,
    Mp3_256,
    Mp3_320,
    Wav,
}

impl From<ModeArg> for TranscodeMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Original => Self::Original,
            ModeArg::Mp3_128 => Self::Mp3_128,
            ModeArg::Mp3_192 => Self::Mp3_192,
            ModeArg::Mp3_256 => Self::Mp3_256,
            ModeArg::Mp3_320 => Self::Mp3_320,
            ModeArg::Wav => Self::Wav,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = connect(cli.connection)?;
    let result = run(&client, cli.command).await;
    if let Err(e) = client.logout().await {
        eprintln!("warning: logout failed: {e}");
    }
    result
}

fn connect(args: Connection) -> Result<AudioStationClient> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ClientConfig::load_default().context("failed to load config")?,
    };
    if let Some(url) = args.url {
        config.base_url = url;
    }
    if args.personal {
        config.personal_library_only = true;
    }

    let account = args
        .account
        .context("account required (--account or AUDIOSTATION_ACCOUNT)")?;
    let password = args
        .password
        .context("password required (--password or AUDIOSTATION_PASSWORD)")?;
    let mut credentials = Credentials::new(account, password);
    if let Some(otp) = args.otp {
        credentials = credentials.with_otp(otp);
    }
    Ok(AudioStationClient::new(config, credentials)?)
}

async fn run(client: &AudioStationClient, command: Command) -> Result<()> {
    match command {
        Command::Apis => cmd_apis(client).await,
        Command::Songs {
            page,
            artist,
            album,
            genre,
        } => {
            let mut filters = Vec::new();
            if let Some(a) = &artist {
                filters.push((SongFilter::Artist, a.as_str()));
            }
            if let Some(a) = &album {
                filters.push((SongFilter::Album, a.as_str()));
            }
            if let Some(g) = &genre {
                filters.push((SongFilter::Genre, g.as_str()));
            }
            cmd_songs(client, page.into(), &filters).await
        }
        Command::Albums { page, artist } => {
            cmd_albums(client, page.into(), artist.as_deref()).await
        }
        Command::Artists { page } => cmd_artists(client, page.into()).await,
        Command::Playlists { page } => cmd_playlists(client, page.into()).await,
        Command::Playlist { id, page } => cmd_playlist(client, &id, page.into()).await,
        Command::Search { keyword } => cmd_search(client, &keyword).await,
        Command::Cover {
            artist,
            album,
            output,
        } => cmd_cover(client, &artist, album.as_deref(), output).await,
        Command::Stream {
            song_id,
            mode,
            position,
            output,
        } => cmd_stream(client, &song_id, mode.into(), position, output).await,
        Command::Rate { song_id, rating } => {
            client.rate_song(&song_id, rating).await?;
            println!("Rated {song_id}: {rating}/5");
            Ok(())
        }
        Command::Tags { paths } => cmd_tags(client, &paths).await,
    }
}

// ── library ──

async fn cmd_apis(client: &AudioStationClient) -> Result<()> {
    for api in client.supported_apis().await? {
        println!(
            "  {:<32} v{} (v{}-v{})  {}",
            api.name, api.version, api.min_version, api.max_version, api.path
        );
    }
    Ok(())
}

async fn cmd_songs(
    client: &AudioStationClient,
    page: Page,
    filters: &[(SongFilter, &str)],
) -> Result<()> {
    let result = client
        .list_songs(page, &[AdditionalField::SongTag, AdditionalField::SongAudio], filters)
        .await?;
    println!("Total: {}\n", result.total);
    for s in &result.items {
        let tag = s.additional.as_ref().and_then(|a| a.song_tag.as_ref());
        let duration = s
            .additional
            .as_ref()
            .and_then(|a| a.song_audio.as_ref())
            .map_or(0, |a| a.duration);
        println!(
            "  [{}] {} - {} ({}:{:02})",
            s.id,
            tag.map_or("", |t| t.artist.as_str()),
            s.title,
            duration / 60,
            duration % 60,
        );
    }
    Ok(())
}

async fn cmd_albums(client: &AudioStationClient, page: Page, artist: Option<&str>) -> Result<()> {
    let result = client.list_albums(page, artist).await?;
    println!("Total: {}\n", result.total);
    for a in &result.items {
        println!("  {} - {} ({})", a.display_artist, a.name, a.year);
    }
    Ok(())
}

async fn cmd_artists(client: &AudioStationClient, page: Page) -> Result<()> {
    let result = client.list_artists(page).await?;
    println!("Total: {}\n", result.total);
    for a in &result.items {
        println!("  {}", a.name);
    }
    Ok(())
}

// ── playlists ──

async fn cmd_playlists(client: &AudioStationClient, page: Page) -> Result<()> {
    let result = client.list_playlists(page).await?;
    println!("Total: {}\n", result.total);
    for p in &result.items {
        println!("  [{}] {} ({})", p.id, p.name, p.library);
    }
    Ok(())
}

async fn cmd_playlist(client: &AudioStationClient, id: &str, page: Page) -> Result<()> {
    let Some(p) = client
        .get_playlist(id, page, &[AdditionalField::SongTag])
        .await?
    else {
        bail!("playlist not found: {id}");
    };
    println!("Playlist: {} (id={})", p.name, p.id);
    if let Some(songs) = &p.additional {
        println!("Songs:    {}\n", songs.songs_total);
        for s in &songs.songs {
            let artist = s
                .additional
                .as_ref()
                .and_then(|a| a.song_tag.as_ref())
                .map_or("", |t| t.artist.as_str());
            println!("  [{}] {} - {}", s.id, artist, s.title);
        }
    }
    Ok(())
}

// ── search ──

async fn cmd_search(client: &AudioStationClient, keyword: &str) -> Result<()> {
    let r = client.search(keyword).await?;
    println!("Artists ({}):", r.artist_total);
    for a in &r.artists {
        println!("  {}", a.name);
    }
    println!("Albums ({}):", r.album_total);
    for a in &r.albums {
        println!("  {} - {}", a.album_artist, a.name);
    }
    println!("Songs ({}):", r.song_total);
    for s in &r.songs {
        println!("  [{}] {}", s.id, s.title);
    }
    Ok(())
}

// ── tags ──

async fn cmd_tags(client: &AudioStationClient, paths: &[String]) -> Result<()> {
    let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
    let tags = client.song_file_tags(&paths).await?;
    for f in &tags.files {
        println!("{}", f.path);
        println!("  Title:        {}", f.title);
        println!("  Artist:       {}", f.artist);
        println!("  Album:        {}", f.album);
        println!("  Album artist: {}", f.album_artist);
        println!("  Genre:        {}", f.genre);
        println!("  Year/Track:   {} / {}", f.year, f.track);
    }
    if tags.read_fail_count > 0 {
        eprintln!("warning: {} file(s) could not be read", tags.read_fail_count);
    }
    Ok(())
}

// ── cover / stream / rate ──

async fn cmd_cover(
    client: &AudioStationClient,
    artist: &str,
    album: Option<&str>,
    output: PathBuf,
) -> Result<()> {
    let cover = match album {
        Some(album) => client.album_cover(artist, album).await?,
        None => client.artist_cover(artist).await?,
    };
    tokio::fs::write(&output, &cover.data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Saved {} ({} bytes, {})",
        output.display(),
        cover.data.len(),
        cover.content_type.as_deref().unwrap_or("unknown type")
    );
    Ok(())
}

async fn cmd_stream(
    client: &AudioStationClient,
    song_id: &str,
    mode: TranscodeMode,
    position: f64,
    output: PathBuf,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut stream = client.stream_song(song_id, mode, position, cancel).await?;
    let mut file = tokio::fs::File::create(&output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => file.write_all(&bytes).await?,
            Err(AudioStationError::Cancelled) => {
                file.flush().await?;
                println!(
                    "Cancelled after {} bytes, partial file kept at {}",
                    stream.bytes_read(),
                    output.display()
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
    file.flush().await?;
    println!("Downloaded {} ({} bytes)", output.display(), stream.bytes_read());
    Ok(())
}
