use {
    serenity::{
        all::{
            Command,
            CommandDataOptionValue,
            CommandInteraction,
            CommandOptionType,
            CommandType,
            CreateCommand,
            CreateCommandOption,
            EditInteractionResponse,
            GatewayIntents,
            Interaction,
            InteractionContext,
            Message,
            Ready,
        },
        client::{
            Client,
            Context as DiscordCtx,
            EventHandler,
        },
        prelude::TypeMapKey,
    },
    tokio::time::sleep,
    crate::{
        context::App,
        prelude::*,
        race::{
            self,
            ResultsOutcome,
        },
        results,
        scoring::RaceKind,
        sheets,
        standings::{
            self,
            Standings,
        },
    },
};

const SET_CURRENT_RACE: &str = "set_current_race";
/// How long the "set a race first" hint stays in the results channel.
const HINT_LIFETIME: Duration = Duration::from_secs(10);

enum AppKey {}

impl TypeMapKey for AppKey {
    type Value = Arc<App>;
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Race(#[from] race::Error),
    #[error(transparent)] Serenity(#[from] serenity::Error),
    #[error(transparent)] Sheets(#[from] sheets::Error),
}

async fn app(ctx: &DiscordCtx) -> Arc<App> {
    ctx.data.read().await.get::<AppKey>().expect("app context missing from Discord context").clone()
}

fn set_current_race_command() -> CreateCommand {
    CreateCommand::new(SET_CURRENT_RACE)
        .kind(CommandType::ChatInput)
        .add_context(InteractionContext::Guild)
        .description("Sets the race that results are recorded for, and its type.")
        .description_localized("it", "Imposta la gara attuale e il tipo (gara/sprint).")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "name",
            "The race, e.g. BELGIO.",
        )
            .description_localized("it", "Es. BELGIO")
            .required(true)
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "mode",
            "Whether this is a full race or a sprint.",
        )
            .description_localized("it", "GARA o SPRINT")
            .required(true)
            .add_string_choice("Race", "race")
            .add_string_choice("Sprint", "sprint")
        )
}

fn string_option<'a>(interaction: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    interaction.data.options.iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            CommandDataOptionValue::String(ref value) => Some(&**value),
            _ => None,
        })
}

async fn set_current_race(ctx: &DiscordCtx, interaction: &CommandInteraction) -> Result<(), Error> {
    interaction.defer_ephemeral(ctx).await?;
    let app = app(ctx).await;
    let name = string_option(interaction, "name").unwrap_or_default();
    let Some(kind) = string_option(interaction, "mode").and_then(|mode| mode.parse::<RaceKind>().ok()) else {
        interaction.edit_response(ctx, EditInteractionResponse::new()
            .content("Please choose whether this is a race or a sprint.")
        ).await?;
        return Ok(())
    };
    let result = {
        let _event = app.lock_event().await;
        race::set_active_race(&app, name, kind).await
    };
    let content = match result {
        Ok(race) => format!("Current race set to **{}** ({}).", race.name, race.kind),
        Err(e) => if let Some(message) = e.validation_message() {
            message
        } else {
            interaction.edit_response(ctx, EditInteractionResponse::new()
                .content(format!("Sorry, setting the current race failed: {e}"))
            ).await?;
            return Err(e.into())
        },
    };
    interaction.edit_response(ctx, EditInteractionResponse::new().content(content)).await?;
    Ok(())
}

async fn results_message(ctx: &DiscordCtx, msg: &Message) -> Result<(), Error> {
    if msg.author.bot { return Ok(()) }
    let app = app(ctx).await;
    if msg.channel_id != app.layout.results_channel { return Ok(()) }
    let _event = app.lock_event().await;
    match race::record_results(&app, &msg.content).await? {
        ResultsOutcome::NoActiveRace => {
            let hint = msg.channel_id.say(ctx, format!("Set the race first with /{SET_CURRENT_RACE}.")).await?;
            let http = ctx.http.clone();
            tokio::spawn(async move {
                sleep(HINT_LIFETIME).await;
                if let Err(e) = hint.channel_id.delete_message(&http, hint.id).await {
                    log::warn!("failed to delete hint message {}: {e}", hint.id);
                }
            });
        }
        ResultsOutcome::Recorded(outcomes) => {
            let standings = Standings::fetch(&*app.sheet, &app.layout).await?;
            standings::publish(ctx, app.layout.standings_channel, &standings).await?;
            for reply in results::acknowledgment(&outcomes) {
                msg.channel_id.say(ctx, reply).await?;
            }
        }
    }
    Ok(())
}

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: DiscordCtx, ready: Ready) {
        match Command::set_global_commands(&ctx, vec![set_current_race_command()]).await {
            Ok(commands) => log::info!("registered {} slash command(s)", commands.len()),
            Err(e) => log::error!("failed to register slash commands: {e}"),
        }
        log::info!("logged in as {}", ready.user.name);
    }

    async fn interaction_create(&self, ctx: DiscordCtx, interaction: Interaction) {
        if let Interaction::Command(interaction) = interaction {
            if interaction.data.name == SET_CURRENT_RACE {
                if let Err(e) = set_current_race(&ctx, &interaction).await {
                    log::error!("error handling /{SET_CURRENT_RACE}: {e}");
                }
            }
        }
    }

    async fn message(&self, ctx: DiscordCtx, msg: Message) {
        if let Err(e) = results_message(&ctx, &msg).await {
            log::error!("error handling message {} in channel {}: {e}", msg.id, msg.channel_id);
        }
    }
}

/// Connects to Discord and handles events until the connection is closed for good.
pub(crate) async fn run(token: &str, app: App) -> serenity::Result<()> {
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(token, intents)
        .event_handler(Handler)
        .type_map_insert::<AppKey>(Arc::new(app))
        .await?;
    client.start().await
}
