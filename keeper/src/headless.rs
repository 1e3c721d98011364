//! Line protocol for running a campaign without a UI.
//!
//! - Lines starting with `#` are commands
//! - Output lines are tagged (`[PARTY]`, `[DAY 2]`, `[TOAST]`, ...)
//! - Signals emitted by a command are printed after its result

use ai_gateway::AspectRatio;
use campaign_core::campaign::{Campaign, CampaignError};
use campaign_core::events::{Signal, SignalReceiver, ToastLevel};
use campaign_core::generate::{LootBrief, NpcBrief};
use campaign_core::headless::{open_campaign, HeadlessConfig};
use campaign_core::journal::LogKind;
use campaign_core::party::{PartyMember, Wallet};
use campaign_core::quest::{FullQuest, QuestStatus};
use campaign_core::soundboard::Mood;
use campaign_core::store::Collection;
use campaign_core::travel::{
    DestinationChoice, Pace, RetryOutcome, TravelMethod, TravelPhase, TravelPlan,
};
use std::io::{self, BufRead, Write};

const HELP: &str = "\
  #help                               - Show this help
  #quit                               - Exit
  #status                             - Campaign overview
  #party                              - List party members
  #member <name> <race> <class>       - Add a party member
  #xp <amount>                        - Award XP to the whole party
  #stash                              - Show the shared stash
  #deposit <gp> <sp> <cp>             - Put coin in the stash
  #treasure <source>                  - Generate loot into the stash
  #npcs                               - List NPCs
  #npc [hint]                         - Generate an NPC at the active location
  #quests                             - List quests
  #quest <title>                      - Add a quest
  #complete <n> / #fail <n>           - Close quest number n
  #note <title> | <body>              - Add a note
  #log                                - Recent campaign log
  #travel <days> <method> <pace> <destination>
                                      - Plan a journey; destination is a name,
                                        breach, generic:<kind> or lore:<region>/<name>
  #journey                            - Show the itinerary
  #fight <day> / #loot <day> / #explore <day> / #skip <day>
  #arrive / #abort / #retry / #dismiss
  #combat / #next                     - Initiative order / advance a turn
  #damage <n> <amount> / #heal <n> <amount>
  #endcombat                          - Clear the tracker
  #location                           - Describe the active location
  #playlist <mood>                    - Tracks for a mood
  #image <prompt>                     - Generate an image into the gallery
  #keys / #raw <key>                  - Inspect stored documents
  #language <language>                - Language for generated content";

/// One parsed `#command`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Status,
    Party,
    AddMember { name: String, race: String, class: String },
    Xp(u32),
    Stash,
    Deposit(Wallet),
    Treasure(String),
    Npcs,
    GenerateNpc(Option<String>),
    Quests,
    AddQuest(String),
    CloseQuest { index: usize, status: QuestStatus },
    Note { title: String, body: String },
    Log,
    Travel(TravelPlan),
    Journey,
    Fight(u32),
    Loot(u32),
    Explore(u32),
    Skip(u32),
    Arrive,
    Abort,
    Retry,
    Dismiss,
    Combat,
    Next,
    Damage { index: usize, amount: i32 },
    Heal { index: usize, amount: i32 },
    EndCombat,
    Location,
    Playlist(Mood),
    Image(String),
    Keys,
    Raw(Collection),
    Language(String),
}

fn number<T: std::str::FromStr>(word: Option<&str>, usage: &str) -> Result<T, String> {
    word.and_then(|w| w.parse().ok())
        .ok_or_else(|| format!("Usage: {usage}"))
}

fn rest(words: &[&str]) -> Option<String> {
    Some(words.join(" ")).filter(|s| !s.trim().is_empty())
}

fn destination(text: &str) -> DestinationChoice {
    let text = text.trim();
    if text.eq_ignore_ascii_case("breach") {
        return DestinationChoice::Breach;
    }
    if let Some(kind) = text.strip_prefix("generic:") {
        return DestinationChoice::Generic {
            kind: kind.trim().to_string(),
        };
    }
    if let Some((region_id, name)) = text.strip_prefix("lore:").and_then(|s| s.split_once('/')) {
        return DestinationChoice::Lore {
            region_id: region_id.trim().to_string(),
            name: name.trim().to_string(),
        };
    }
    DestinationChoice::Custom {
        name: text.to_string(),
    }
}

impl Command {
    /// Parse a line that starts with `#`.
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim().trim_start_matches('#');
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Err("Empty command. Type #help for help.".to_string());
        };

        let command = match name.to_lowercase().as_str() {
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "status" => Command::Status,
            "party" => Command::Party,
            "member" => match args {
                [name, race, class, ..] => Command::AddMember {
                    name: name.to_string(),
                    race: race.to_string(),
                    class: class.to_string(),
                },
                _ => return Err("Usage: #member <name> <race> <class>".to_string()),
            },
            "xp" => Command::Xp(number(args.first().copied(), "#xp <amount>")?),
            "stash" => Command::Stash,
            "deposit" => {
                let usage = "#deposit <gp> <sp> <cp>";
                Command::Deposit(Wallet::new(
                    number(args.first().copied(), usage)?,
                    number(args.get(1).copied(), usage)?,
                    number(args.get(2).copied(), usage)?,
                ))
            }
            "treasure" => Command::Treasure(rest(args).ok_or("Usage: #treasure <source>")?),
            "npcs" => Command::Npcs,
            "npc" => Command::GenerateNpc(rest(args)),
            "quests" => Command::Quests,
            "quest" => Command::AddQuest(rest(args).ok_or("Usage: #quest <title>")?),
            "complete" | "fail" => Command::CloseQuest {
                index: number(args.first().copied(), "#complete <n>")?,
                status: if name.eq_ignore_ascii_case("fail") {
                    QuestStatus::Failed
                } else {
                    QuestStatus::Completed
                },
            },
            "note" => {
                let text = rest(args).ok_or("Usage: #note <title> | <body>")?;
                let (title, body) = text.split_once('|').unwrap_or((text.as_str(), ""));
                Command::Note {
                    title: title.trim().to_string(),
                    body: body.trim().to_string(),
                }
            }
            "log" => Command::Log,
            "travel" => {
                let usage = "#travel <days> <method> <pace> <destination>";
                let days = number(args.first().copied(), usage)?;
                let method: TravelMethod = args
                    .get(1)
                    .ok_or_else(|| format!("Usage: {usage}"))?
                    .parse()?;
                let pace: Pace = args.get(2).ok_or_else(|| format!("Usage: {usage}"))?.parse()?;
                let target = rest(args.get(3..).unwrap_or_default())
                    .ok_or_else(|| format!("Usage: {usage}"))?;
                Command::Travel(TravelPlan::new(destination(&target), method, pace, days))
            }
            "journey" => Command::Journey,
            "fight" => Command::Fight(number(args.first().copied(), "#fight <day>")?),
            "loot" => Command::Loot(number(args.first().copied(), "#loot <day>")?),
            "explore" => Command::Explore(number(args.first().copied(), "#explore <day>")?),
            "skip" => Command::Skip(number(args.first().copied(), "#skip <day>")?),
            "arrive" => Command::Arrive,
            "abort" => Command::Abort,
            "retry" => Command::Retry,
            "dismiss" => Command::Dismiss,
            "combat" => Command::Combat,
            "next" => Command::Next,
            "damage" | "heal" => {
                let usage = "#damage <n> <amount>";
                let index = number(args.first().copied(), usage)?;
                let amount = number(args.get(1).copied(), usage)?;
                if name.eq_ignore_ascii_case("heal") {
                    Command::Heal { index, amount }
                } else {
                    Command::Damage { index, amount }
                }
            }
            "endcombat" => Command::EndCombat,
            "location" => Command::Location,
            "playlist" => {
                Command::Playlist(args.first().ok_or("Usage: #playlist <mood>")?.parse()?)
            }
            "image" => Command::Image(rest(args).ok_or("Usage: #image <prompt>")?),
            "keys" => Command::Keys,
            "raw" => Command::Raw(args.first().ok_or("Usage: #raw <key>")?.parse()?),
            "language" => Command::Language(rest(args).ok_or("Usage: #language <language>")?),
            _ => return Err("Unknown command. Type #help for help.".to_string()),
        };
        Ok(command)
    }
}

/// Run the campaign loop on stdin/stdout until `#quit` or end of input.
pub async fn run(config: HeadlessConfig) -> Result<(), CampaignError> {
    let mut campaign = open_campaign(config).await?;
    let mut signals = campaign.subscribe();

    println!("=== Keeper ===");
    print_status(&campaign);
    for key in campaign.corrupt_keys() {
        println!(
            "[WARNING] Stored '{key}' is corrupt; it starts empty until you change it (#raw {key})"
        );
    }
    println!();
    println!("Type #help for commands.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('#') {
            println!("[ERROR] Commands start with '#'. Type #help for help.");
            continue;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(message) => {
                println!("[ERROR] {message}");
                continue;
            }
        };
        if command == Command::Quit {
            println!("Goodbye!");
            break;
        }

        if let Err(e) = execute(&mut campaign, command).await {
            println!("[ERROR] {e}");
        }
        if let Err(e) = campaign.process_signals().await {
            println!("[ERROR] {e}");
        }
        print_signals(&mut signals);
        stdout.flush().ok();
    }

    Ok(())
}

fn print_signals(signals: &mut SignalReceiver) {
    for signal in signals.drain() {
        match signal {
            Signal::Toast(toast) => {
                let tag = match toast.level {
                    ToastLevel::Info | ToastLevel::Success => "TOAST",
                    ToastLevel::Warning => "WARNING",
                    ToastLevel::Error => "FAILED",
                };
                println!("[{tag}] {}", toast.message);
            }
            Signal::OpenSettings => {
                println!(
                    "[SETTINGS] The provider rejected the API key. Set AI_API_KEY and restart."
                );
            }
            Signal::SwitchTab(tab) => println!("[VIEW] {tab:?}"),
            Signal::ImageGenerated(image) => println!("[IMAGE] {} saved", image.id),
            _ => {}
        }
    }
}

fn print_status(campaign: &Campaign) {
    println!("[STATUS]");
    println!("  Party: {} member(s)", campaign.party().len());
    let wallet = &campaign.stash().wallet;
    println!("  Stash: {} gp {} sp {} cp", wallet.gp, wallet.sp, wallet.cp);
    println!("  Quests: {} active", campaign.quests().active().count());
    if let Some(location) = campaign.active_location() {
        println!("  Location: {}", location.name);
    }
    match campaign.travel_phase() {
        TravelPhase::Journey => {
            if let Some(state) = campaign.travel_state() {
                println!(
                    "  Travelling to {} ({}/{} day(s) resolved)",
                    state.destination.name,
                    state.completed_days.len(),
                    state.plan.days
                );
            }
        }
        TravelPhase::Error(failure) => {
            println!("  Travel failed: {} (#retry or #dismiss)", failure.message)
        }
        _ => {}
    }
    if !campaign.effective_settings().has_credentials() {
        println!("  No API key configured; AI features are unavailable.");
    }
}

fn print_journey(campaign: &Campaign) {
    let Some(state) = campaign.travel_state() else {
        println!("[JOURNEY] None. Plan one with #travel.");
        return;
    };
    println!("[JOURNEY] {}", state.result.title);
    if !state.result.summary.is_empty() {
        println!("{}", state.result.summary);
    }
    for event in &state.result.events {
        let mark = if state.is_resolved(event.day) { "x" } else { " " };
        println!("[DAY {}] [{mark}] {} ({})", event.day, event.title, event.kind);
        if !event.description.is_empty() {
            println!("    {}", event.description);
        }
        if !event.threats.is_empty() {
            println!("    Threats: {}", event.threats.join(", "));
        }
        if !event.loot.is_empty() {
            println!("    Loot: {}", event.loot.join(", "));
        }
        if let Some(place) = &event.suggested_location {
            println!("    Nearby: {place}");
        }
    }
}

fn print_combat(campaign: &Campaign) {
    let tracker = campaign.combat();
    if tracker.is_empty() {
        println!("[COMBAT] No combatants.");
        return;
    }
    println!("[COMBAT] Round {}", tracker.round());
    let current = tracker.current().map(|c| c.id);
    for (i, c) in tracker.combatants().iter().enumerate() {
        let marker = if Some(c.id) == current { ">" } else { " " };
        println!(
            "{marker} {}. {} init {} HP {}/{} AC {}{}",
            i + 1,
            c.name,
            c.initiative,
            c.hp,
            c.max_hp,
            c.ac,
            if c.is_down() { " (down)" } else { "" }
        );
    }
}

fn combatant_id(
    campaign: &Campaign,
    index: usize,
) -> Result<campaign_core::RecordId, CampaignError> {
    index
        .checked_sub(1)
        .and_then(|i| campaign.combat().combatants().get(i))
        .map(|c| c.id)
        .ok_or_else(|| CampaignError::NotFound(format!("combatant {index}")))
}

async fn execute(campaign: &mut Campaign, command: Command) -> Result<(), CampaignError> {
    match command {
        Command::Help => println!("[HELP]\n{HELP}"),
        Command::Quit => {}
        Command::Status => print_status(campaign),
        Command::Party => {
            println!("[PARTY]");
            for m in campaign.party().members() {
                let level_up = if m.can_level_up() { " (can level up)" } else { "" };
                println!(
                    "  {} - {} {} L{} XP {} HP {}/{} AC {}{level_up}",
                    m.name, m.race, m.class, m.level, m.xp, m.hp, m.max_hp, m.ac
                );
            }
        }
        Command::AddMember { name, race, class } => {
            campaign.upsert_member(PartyMember::new(name.as_str(), race, class)).await?;
            println!("[PARTY] {name} joined");
        }
        Command::Xp(amount) => {
            let awarded = campaign.award_xp(amount, &[]).await?;
            println!("[PARTY] {awarded} member(s) gained {amount} XP");
        }
        Command::Stash => {
            let stash = campaign.stash();
            let wallet = &stash.wallet;
            println!("[STASH] {} gp {} sp {} cp", wallet.gp, wallet.sp, wallet.cp);
            for item in &stash.items {
                println!("  {} x{}", item.name, item.quantity);
            }
        }
        Command::Deposit(coins) => {
            campaign.deposit_to_stash(Vec::new(), coins).await?;
            println!("[STASH] Deposited");
        }
        Command::Treasure(source) => {
            let party_level = campaign.party().members().iter().map(|m| m.level).max().unwrap_or(1);
            let brief = LootBrief {
                source,
                party_level,
                count: 3,
            };
            for item in campaign.generate_loot(&brief).await? {
                println!("[LOOT] {} x{} ({})", item.name, item.quantity, item.value);
            }
        }
        Command::Npcs => {
            println!("[NPCS]");
            for npc in campaign.npcs().all() {
                println!(
                    "  {} ({}) {} at {} [{:?}, {:?}]",
                    npc.name, npc.race, npc.role, npc.location, npc.status, npc.attitude
                );
            }
        }
        Command::GenerateNpc(hint) => {
            let brief = NpcBrief {
                location: campaign.active_location().map(|l| l.name.clone()),
                hint,
            };
            let npc = campaign.generate_npc(&brief).await?;
            println!("[NPC] {} - {} {}", npc.name, npc.race, npc.role);
            println!("{}", npc.description);
        }
        Command::Quests => {
            println!("[QUESTS]");
            for (i, q) in campaign.quests().all().iter().enumerate() {
                let (done, total) = q.progress();
                println!("  {}. {} [{:?}] {done}/{total}", i + 1, q.title, q.status);
            }
        }
        Command::AddQuest(title) => campaign.add_quest(FullQuest::new(title)).await?,
        Command::CloseQuest { index, status } => {
            let id = index
                .checked_sub(1)
                .and_then(|i| campaign.quests().all().get(i))
                .map(|q| q.id)
                .ok_or_else(|| CampaignError::NotFound(format!("quest {index}")))?;
            campaign.set_quest_status(id, status).await?;
        }
        Command::Note { title, body } => {
            campaign.add_note(&title, &body).await?;
            println!("[NOTE] Saved '{title}'");
        }
        Command::Log => {
            println!("[LOG]");
            for entry in campaign.log().recent(15) {
                let kind = match entry.kind {
                    LogKind::Quest => "quest",
                    LogKind::Travel => "travel",
                    LogKind::Combat => "combat",
                    LogKind::Party => "party",
                    LogKind::General => "note",
                };
                println!("  {} [{kind}] {}", entry.at.format("%Y-%m-%d %H:%M"), entry.text);
            }
        }
        Command::Travel(plan) => {
            print!("[PROCESSING]");
            io::stdout().flush().ok();
            let result = campaign.plan_journey(plan).await;
            print!("\r            \r");
            result?;
            print_journey(campaign);
        }
        Command::Journey => print_journey(campaign),
        Command::Fight(day) => {
            let combatants = campaign.start_combat(day).await?;
            println!("[FIGHT] {} combatant(s) join the tracker", combatants.len());
            print_combat(campaign);
        }
        Command::Loot(day) => {
            campaign.take_loot(day).await?;
        }
        Command::Explore(day) => {
            let location = campaign.explore(day).await?;
            println!("[LOCATION] {}\n{}", location.name, location.description);
        }
        Command::Skip(day) => {
            campaign.skip_day(day).await?;
            println!("[DAY {day}] Skipped");
        }
        Command::Arrive => {
            let location = campaign.arrive().await?;
            println!("[ARRIVED] {}\n{}", location.name, location.description);
        }
        Command::Abort => {
            if campaign.abort_journey().await? {
                println!("[JOURNEY] Abandoned");
            } else {
                println!("[JOURNEY] Nothing to abandon");
            }
        }
        Command::Retry => match campaign.retry_travel().await? {
            RetryOutcome::Planned => print_journey(campaign),
            RetryOutcome::Arrived(location) => {
                println!("[ARRIVED] {}\n{}", location.name, location.description)
            }
        },
        Command::Dismiss => campaign.dismiss_travel_error(),
        Command::Combat => print_combat(campaign),
        Command::Next => {
            campaign.next_turn().await?;
            print_combat(campaign);
        }
        Command::Damage { index, amount } => {
            let id = combatant_id(campaign, index)?;
            let hp = campaign.damage(id, amount).await?;
            println!("[COMBAT] HP now {hp}");
        }
        Command::Heal { index, amount } => {
            let id = combatant_id(campaign, index)?;
            let hp = campaign.heal(id, amount).await?;
            println!("[COMBAT] HP now {hp}");
        }
        Command::EndCombat => campaign.end_combat().await?,
        Command::Location => match campaign.active_location() {
            Some(location) => {
                println!("[LOCATION] {} ({})", location.name, location.kind);
                println!("{}", location.description);
                if !location.atmosphere.is_empty() {
                    println!("Atmosphere: {}", location.atmosphere);
                }
                for npc in &location.npcs {
                    println!("  NPC: {} - {}", npc.name, npc.role);
                }
                for secret in &location.secrets {
                    println!("  Secret: {secret}");
                }
            }
            None => println!("[LOCATION] None"),
        },
        Command::Playlist(mood) => {
            println!("[PLAYLIST] {mood}");
            for track in campaign.soundboard().playlist(mood) {
                println!("  {}", track.title);
            }
        }
        Command::Image(prompt) => {
            campaign.generate_image(&prompt, AspectRatio::Landscape).await?;
        }
        Command::Keys => {
            for key in campaign.keys().await? {
                println!("  {key}");
            }
        }
        Command::Raw(key) => match campaign.raw(key).await? {
            Some(doc) => {
                if let Some(error) = &doc.error {
                    println!("[CORRUPT] {error}");
                }
                println!("{}", doc.text);
            }
            None => println!("[RAW] '{key}' has never been saved"),
        },
        Command::Language(language) => {
            let mut settings = campaign.settings().clone();
            settings.language = language;
            campaign.update_settings(settings).await?;
            println!("[SETTINGS] Saved");
        }
    }
    Ok(())
}
