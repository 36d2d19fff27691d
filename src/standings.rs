use {
    serenity::{
        all::{
            CreateEmbed,
            CreateMessage,
            GetMessages,
        },
        client::Context as DiscordCtx,
        model::id::ChannelId,
    },
    crate::{
        config::Layout,
        scoring::format_points,
        sheets::{
            self,
            Spreadsheet,
            StandingsRow,
        },
    },
};

/// Discord's limit on the length of an embed description.
const EMBED_DESCRIPTION_LIMIT: usize = 4096;
/// How far back the previous standings are looked for.
const HISTORY_LIMIT: u8 = 100;

pub(crate) struct Standings {
    pub(crate) pilots: Vec<StandingsRow>,
    pub(crate) teams: Vec<StandingsRow>,
}

impl Standings {
    /// Reads both standings tables and ranks them, highest total first.
    pub(crate) async fn fetch(sheet: &(impl Spreadsheet + ?Sized), layout: &Layout) -> Result<Self, sheets::Error> {
        let (mut pilots, mut teams) = sheets::fetch_standings(sheet, &layout.pilots_tab, &layout.teams_tab).await?;
        rank(&mut pilots);
        rank(&mut teams);
        Ok(Self { pilots, teams })
    }

    fn embeds(&self) -> Vec<CreateEmbed> {
        vec![
            CreateEmbed::new().title("Driver standings").description(render(&self.pilots)),
            CreateEmbed::new().title("Constructor standings").description(render(&self.teams)),
        ]
    }
}

/// Sorts by total, descending. Ties keep sheet order.
fn rank(rows: &mut [StandingsRow]) {
    rows.sort_by(|a, b| b.total.total_cmp(&a.total));
}

/// Renders ranked rows as an embed description, cut off on a line boundary if it gets too long.
pub(crate) fn render(rows: &[StandingsRow]) -> String {
    if rows.is_empty() { return format!("No data") }
    let mut description = String::default();
    for (rank, StandingsRow { name, total, .. }) in (1..).zip(rows) {
        let line = format!("{rank}) {name} - {} pt\n", format_points(*total));
        if description.chars().count() + line.chars().count() > EMBED_DESCRIPTION_LIMIT { break }
        description.push_str(&line);
    }
    description
}

/// Replaces the bot's previous standings in `channel` with the current ones.
///
/// Does nothing if the channel can't be resolved.
pub(crate) async fn publish(ctx: &DiscordCtx, channel: ChannelId, standings: &Standings) -> serenity::Result<()> {
    if let Err(e) = channel.to_channel(ctx).await {
        log::warn!("standings channel {channel} not available, not publishing: {e}");
        return Ok(())
    }
    let bot_id = ctx.cache.current_user().id;
    for message in channel.messages(ctx, GetMessages::new().limit(HISTORY_LIMIT)).await? {
        if message.author.id == bot_id {
            channel.delete_message(ctx, message.id).await?;
        }
    }
    channel.send_message(ctx, CreateMessage::new().embeds(standings.embeds())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, total: f64) -> StandingsRow {
        StandingsRow { row: 0, name: name.to_owned(), total }
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let mut rows = vec![row("Ana", 18.0), row("Max", 25.0), row("Leo", 18.0), row("Kim", 0.0)];
        rank(&mut rows);
        assert_eq!(rows.iter().map(|row| &*row.name).collect::<Vec<_>>(), ["Max", "Ana", "Leo", "Kim"]);
    }

    #[test]
    fn renders_ranked_lines() {
        assert_eq!(render(&[row("Max", 25.0), row("Ana", 12.5)]), "1) Max - 25 pt\n2) Ana - 12.5 pt\n");
    }

    #[test]
    fn empty_standings_render_placeholder() {
        assert_eq!(render(&[]), "No data");
    }

    #[test]
    fn long_standings_are_truncated() {
        let rows = (0..500).map(|idx| row(&format!("Pilot with a rather long name {idx}"), 1.0)).collect::<Vec<_>>();
        let description = render(&rows);
        assert!(description.chars().count() <= EMBED_DESCRIPTION_LIMIT);
        assert!(description.ends_with(" pt\n"));
    }
}
