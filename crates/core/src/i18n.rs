//! Embedded message catalogs.
//!
//! Templates use tera placeholders (`{{ name }}`). Lookups fall back to the
//! English catalog, and a template that fails to render is returned raw.

use tera::{Context, Tera};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Locale {
    En,
    De,
    Fr,
    PtBr,
}

impl Locale {
    /// Maps a locale tag such as `de-AT` or `pt_BR` onto a bundled catalog.
    pub fn resolve(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase().replace('_', "-");
        let language = normalized.split('-').next().unwrap_or_default();
        match language {
            "de" => Self::De,
            "fr" => Self::Fr,
            "pt" => Self::PtBr,
            _ => Self::En,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
            Self::Fr => "fr",
            Self::PtBr => "pt-BR",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageId {
    DefaultMeetingTopic,
    PersonalMeetingTopic,
    ChannelMeetingTopic,
    MeetingIdLabel,
    PersonalMeetingIdLabel,
    FallbackText,
    AttachmentText,
    AskTitle,
    AskSelectMeetingType,
    AskRandomWords,
    AskPersonalMeeting,
    AskChannelMeeting,
    AskUuidMeeting,
    AskPersonalTopic,
    AskPromptAnswered,
    CommandHelp,
    CommandSettingsCurrent,
    CommandSettingsUpdated,
    CommandSettingsInvalid,
    CommandStartFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Localizer {
    locale: Locale,
}

impl Localizer {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn for_tag(tag: &str) -> Self {
        Self::new(Locale::resolve(tag))
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn text(&self, id: MessageId) -> String {
        self.render(id, &[])
    }

    pub fn render(&self, id: MessageId, data: &[(&str, &str)]) -> String {
        let template = template(self.locale, id).unwrap_or_else(|| english(id));
        if data.is_empty() {
            return template.to_owned();
        }

        let mut context = Context::new();
        for (key, value) in data {
            context.insert(*key, value);
        }

        match Tera::one_off(template, &context, false) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!(
                    event_name = "system.i18n.render_failed",
                    locale = self.locale.tag(),
                    message_id = ?id,
                    error = %error,
                    "message template failed to render"
                );
                template.to_owned()
            }
        }
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Locale::En)
    }
}

fn template(locale: Locale, id: MessageId) -> Option<&'static str> {
    match locale {
        Locale::En => Some(english(id)),
        Locale::De => german(id),
        Locale::Fr => french(id),
        Locale::PtBr => portuguese(id),
    }
}

fn english(id: MessageId) -> &'static str {
    use MessageId::*;

    match id {
        DefaultMeetingTopic => "Google Meeting",
        PersonalMeetingTopic => "{{ name }}'s Personal Meeting",
        ChannelMeetingTopic => "{{ channel_name }} Channel Meeting",
        MeetingIdLabel => "Meeting ID",
        PersonalMeetingIdLabel => "Personal Meeting ID (PMI)",
        FallbackText => {
            "Video Meeting started at [{{ meeting_id }}]({{ meeting_url }}).\n\n[Join Meeting]({{ meeting_url }})"
        }
        AttachmentText => {
            "{{ meeting_type }}: [{{ meeting_id }}]({{ meeting_url }})\n\n[Join Meeting]({{ meeting_url }})"
        }
        AskTitle => "Google Meeting Start",
        AskSelectMeetingType => "Select type of meeting you want to start",
        AskRandomWords => "Meeting name with random words",
        AskPersonalMeeting => "Personal meeting",
        AskChannelMeeting => "Channel meeting",
        AskUuidMeeting => "Meeting name with UUID",
        AskPersonalTopic => "{{ name }}'s Meeting",
        AskPromptAnswered => "Meeting `{{ meeting_id }}` started.",
        CommandHelp => {
            "* `/gmeet` - start a meeting\n* `/gmeet start [topic]` - start a meeting with a topic\n* `/gmeet settings` - show your meeting naming scheme\n* `/gmeet settings <ask|words|uuid|mattermost>` - change your meeting naming scheme"
        }
        CommandSettingsCurrent => "Your meeting naming scheme is `{{ scheme }}`.",
        CommandSettingsUpdated => "Meeting naming scheme set to `{{ scheme }}`.",
        CommandSettingsInvalid => {
            "Unknown naming scheme `{{ scheme }}`. Use one of: ask, words, uuid, mattermost."
        }
        CommandStartFailed => "Unable to start the meeting. Please try again later.",
    }
}

fn german(id: MessageId) -> Option<&'static str> {
    use MessageId::*;

    let text = match id {
        DefaultMeetingTopic => "Google-Besprechung",
        PersonalMeetingTopic => "Persönliche Besprechung von {{ name }}",
        ChannelMeetingTopic => "Kanalbesprechung {{ channel_name }}",
        MeetingIdLabel => "Besprechungs-ID",
        PersonalMeetingIdLabel => "Persönliche Besprechungs-ID (PMI)",
        FallbackText => {
            "Videobesprechung gestartet unter [{{ meeting_id }}]({{ meeting_url }}).\n\n[Besprechung beitreten]({{ meeting_url }})"
        }
        AttachmentText => {
            "{{ meeting_type }}: [{{ meeting_id }}]({{ meeting_url }})\n\n[Besprechung beitreten]({{ meeting_url }})"
        }
        AskTitle => "Google-Besprechung starten",
        AskSelectMeetingType => "Wähle die Art der Besprechung, die du starten möchtest",
        AskRandomWords => "Besprechungsname aus zufälligen Wörtern",
        AskPersonalMeeting => "Persönliche Besprechung",
        AskChannelMeeting => "Kanalbesprechung",
        AskUuidMeeting => "Besprechungsname mit UUID",
        AskPersonalTopic => "Besprechung von {{ name }}",
        AskPromptAnswered => "Besprechung `{{ meeting_id }}` gestartet.",
        CommandSettingsCurrent => "Dein Namensschema für Besprechungen ist `{{ scheme }}`.",
        CommandSettingsUpdated => "Namensschema für Besprechungen auf `{{ scheme }}` gesetzt.",
        CommandStartFailed => "Die Besprechung konnte nicht gestartet werden.",
        _ => return None,
    };
    Some(text)
}

fn french(id: MessageId) -> Option<&'static str> {
    use MessageId::*;

    let text = match id {
        DefaultMeetingTopic => "Réunion Google",
        PersonalMeetingTopic => "Réunion personnelle de {{ name }}",
        ChannelMeetingTopic => "Réunion du canal {{ channel_name }}",
        MeetingIdLabel => "ID de réunion",
        PersonalMeetingIdLabel => "ID de réunion personnelle (PMI)",
        FallbackText => {
            "Réunion vidéo démarrée sur [{{ meeting_id }}]({{ meeting_url }}).\n\n[Rejoindre la réunion]({{ meeting_url }})"
        }
        AttachmentText => {
            "{{ meeting_type }} : [{{ meeting_id }}]({{ meeting_url }})\n\n[Rejoindre la réunion]({{ meeting_url }})"
        }
        AskTitle => "Démarrer une réunion Google",
        AskSelectMeetingType => "Choisissez le type de réunion à démarrer",
        AskRandomWords => "Nom de réunion avec des mots aléatoires",
        AskPersonalMeeting => "Réunion personnelle",
        AskChannelMeeting => "Réunion du canal",
        AskUuidMeeting => "Nom de réunion avec UUID",
        AskPersonalTopic => "Réunion de {{ name }}",
        AskPromptAnswered => "Réunion `{{ meeting_id }}` démarrée.",
        CommandSettingsCurrent => "Votre schéma de nommage des réunions est `{{ scheme }}`.",
        CommandSettingsUpdated => "Schéma de nommage des réunions défini sur `{{ scheme }}`.",
        CommandStartFailed => "Impossible de démarrer la réunion.",
        _ => return None,
    };
    Some(text)
}

fn portuguese(id: MessageId) -> Option<&'static str> {
    use MessageId::*;

    let text = match id {
        DefaultMeetingTopic => "Reunião do Google",
        PersonalMeetingTopic => "Reunião pessoal de {{ name }}",
        ChannelMeetingTopic => "Reunião do canal {{ channel_name }}",
        MeetingIdLabel => "ID da reunião",
        PersonalMeetingIdLabel => "ID de reunião pessoal (PMI)",
        FallbackText => {
            "Reunião de vídeo iniciada em [{{ meeting_id }}]({{ meeting_url }}).\n\n[Entrar na reunião]({{ meeting_url }})"
        }
        AttachmentText => {
            "{{ meeting_type }}: [{{ meeting_id }}]({{ meeting_url }})\n\n[Entrar na reunião]({{ meeting_url }})"
        }
        AskTitle => "Iniciar reunião do Google",
        AskSelectMeetingType => "Selecione o tipo de reunião que deseja iniciar",
        AskRandomWords => "Nome da reunião com palavras aleatórias",
        AskPersonalMeeting => "Reunião pessoal",
        AskChannelMeeting => "Reunião do canal",
        AskUuidMeeting => "Nome da reunião com UUID",
        AskPersonalTopic => "Reunião de {{ name }}",
        AskPromptAnswered => "Reunião `{{ meeting_id }}` iniciada.",
        _ => return None,
    };
    Some(text)
}
