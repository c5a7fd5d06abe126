use crate::catalog::{clothing_name, clothing_options, Gender};
use crate::generation::{GeneratedImage, ImageStatus};
use crate::workflow::{Event, Session, Step, MAX_APPROVED};

pub const CALLBACK_PREFIX: &str = "wiz:";
/// Telegram rejects callback data longer than this.
pub const MAX_CALLBACK_BYTES: usize = 64;

pub const QUALITY_CHECKLIST: [&str; 4] = [
    "Apenas uma pessoa na foto",
    "Imagem nítida e clara (não embaçada)",
    "Rosto claramente visível e descoberto",
    "Fundo neutro é preferível",
];

pub const MAX_APPROVED_NOTICE: &str = "Você atingiu o número máximo de aprovações.";

/// A button press, as carried in Telegram callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    ToggleGlasses,
    Gender(Gender),
    Clothing(String),
    Generate,
    Approve(String),
    Reject(String),
    CompleteReview,
    Variations,
    Back,
    NewProject,
}

impl WizardAction {
    pub fn encode(&self) -> String {
        let body = match self {
            WizardAction::ToggleGlasses => "glasses".to_string(),
            WizardAction::Gender(gender) => format!("gender:{}", gender.as_str()),
            WizardAction::Clothing(key) => format!("clothing:{key}"),
            WizardAction::Generate => "generate".to_string(),
            WizardAction::Approve(id) => format!("approve:{id}"),
            WizardAction::Reject(id) => format!("reject:{id}"),
            WizardAction::CompleteReview => "review".to_string(),
            WizardAction::Variations => "variations".to_string(),
            WizardAction::Back => "back".to_string(),
            WizardAction::NewProject => "new".to_string(),
        };
        format!("{CALLBACK_PREFIX}{body}")
    }

    pub fn decode(data: &str) -> Option<Self> {
        let body = data.strip_prefix(CALLBACK_PREFIX)?;
        let (name, arg) = match body.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (body, None),
        };
        let action = match (name, arg) {
            ("glasses", None) => WizardAction::ToggleGlasses,
            ("gender", Some(arg)) => WizardAction::Gender(Gender::parse(arg)?),
            ("clothing", Some(arg)) if !arg.is_empty() => WizardAction::Clothing(arg.to_string()),
            ("generate", None) => WizardAction::Generate,
            ("approve", Some(arg)) if !arg.is_empty() => WizardAction::Approve(arg.to_string()),
            ("reject", Some(arg)) if !arg.is_empty() => WizardAction::Reject(arg.to_string()),
            ("review", None) => WizardAction::CompleteReview,
            ("variations", None) => WizardAction::Variations,
            ("back", None) => WizardAction::Back,
            ("new", None) => WizardAction::NewProject,
            _ => return None,
        };
        Some(action)
    }

    pub fn into_event(self) -> Event {
        match self {
            WizardAction::ToggleGlasses => Event::ToggleGlasses,
            WizardAction::Gender(gender) => Event::SelectGender(gender),
            WizardAction::Clothing(key) => Event::SelectClothing(key),
            WizardAction::Generate => Event::SubmitConfig,
            WizardAction::Approve(id) => Event::Approve(id),
            WizardAction::Reject(id) => Event::Reject(id),
            WizardAction::CompleteReview => Event::CompleteReview,
            WizardAction::Variations => Event::RequestVariations,
            WizardAction::Back => Event::GoBack,
            WizardAction::NewProject => Event::NewProject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: WizardAction,
}

impl Button {
    fn new(label: impl Into<String>, action: WizardAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// One generated portrait awaiting review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCard {
    pub image_id: String,
    pub image_data: String,
    pub caption: String,
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub image_id: String,
    pub file_name: String,
    pub image_data: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepView {
    pub title: String,
    pub body: String,
    pub status: Option<String>,
    /// Data URL of the uploaded photo, shown while configuring.
    pub preview: Option<String>,
    pub buttons: Vec<Vec<Button>>,
    pub cards: Vec<ImageCard>,
    pub downloads: Vec<DownloadItem>,
}

impl StepView {
    /// Title, body and status joined into one plain-text message.
    pub fn text(&self) -> String {
        let mut text = format!("{}\n\n{}", self.title, self.body);
        if let Some(status) = &self.status {
            text.push_str("\n\n");
            text.push_str(status);
        }
        text
    }
}

pub fn render(session: &Session) -> StepView {
    let mut view = match session.step {
        Step::Upload => render_upload(session),
        Step::Configure => render_configure(session),
        Step::Generate => render_generate(session),
        Step::Gallery => render_gallery(session),
    };

    view.status = if session.is_loading {
        Some(format!("⏳ {}", session.loading_message))
    } else {
        session.error.as_ref().map(|error| format!("⚠️ {error}"))
    };
    if session.is_loading {
        // Buttons would be ignored until the call completes.
        view.buttons.clear();
        view.cards.iter_mut().for_each(|card| card.buttons.clear());
    }
    if session.step != Step::Upload || session.original_image.is_some() {
        view.buttons
            .push(vec![Button::new("Novo Projeto", WizardAction::NewProject)]);
    }
    view
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "✅"
    } else {
        "⬜"
    }
}

fn render_upload(session: &Session) -> StepView {
    let mut body = String::from(
        "Envie uma foto de alta qualidade para começar. Siga as diretrizes abaixo para obter os melhores resultados.\n\nChecklist de Qualidade:",
    );
    for item in QUALITY_CHECKLIST {
        body.push_str("\n• ");
        body.push_str(item);
    }
    body.push_str("\n\nFormatos aceitos: PNG, JPG, WEBP.");

    StepView {
        title: "Passo 1: Envie Sua Foto".to_string(),
        body,
        buttons: vec![vec![Button::new(
            format!("{} Permitir óculos na foto", checkbox(session.allow_glasses)),
            WizardAction::ToggleGlasses,
        )]],
        ..StepView::default()
    }
}

fn render_configure(session: &Session) -> StepView {
    let mut body =
        String::from("Selecione o gênero e o estilo de roupa para o seu retrato profissional.");
    if let Some(gender) = session.gender {
        body.push_str(&format!("\n\nGênero: {}", gender.label()));
        if let Some(key) = &session.clothing {
            body.push_str(&format!("\nEstilo de Roupa: {}", clothing_name(gender, key)));
        }
    }

    let mut buttons = vec![Gender::ALL
        .iter()
        .map(|gender| {
            let selected = session.gender == Some(*gender);
            let label = if selected {
                format!("✅ {}", gender.label())
            } else {
                gender.label().to_string()
            };
            Button::new(label, WizardAction::Gender(*gender))
        })
        .collect::<Vec<_>>()];

    if let Some(gender) = session.gender {
        let clothing = clothing_options(gender)
            .iter()
            .map(|option| {
                let selected = session.clothing.as_deref() == Some(option.key);
                let label = if selected {
                    format!("✅ {}", option.name)
                } else {
                    option.name.to_string()
                };
                Button::new(label, WizardAction::Clothing(option.key.to_string()))
            })
            .collect::<Vec<_>>();
        buttons.extend(clothing.chunks(2).map(|chunk| chunk.to_vec()));
    }

    if session.is_config_ready() {
        buttons.push(vec![Button::new("Gerar Retratos", WizardAction::Generate)]);
    }
    buttons.push(vec![Button::new("← Voltar para o Upload", WizardAction::Back)]);

    StepView {
        title: "Passo 2: Escolha Seu Estilo".to_string(),
        body,
        preview: session.original_image.as_ref().map(|image| image.display_url()),
        buttons,
        ..StepView::default()
    }
}

fn render_card(image: &GeneratedImage, approval_disabled: bool, position: usize) -> ImageCard {
    let mut buttons = Vec::new();
    if image.status == ImageStatus::Pending {
        if !approval_disabled {
            buttons.push(Button::new("✅ Aprovar", WizardAction::Approve(image.id.clone())));
        }
        buttons.push(Button::new("❌ Rejeitar", WizardAction::Reject(image.id.clone())));
    }
    ImageCard {
        image_id: image.id.clone(),
        image_data: image.image_data.clone(),
        caption: format!("Retrato {} · {}", position, image.status.label()),
        buttons,
    }
}

fn render_generate(session: &Session) -> StepView {
    let approved = session.approved_count();
    let full = session.gallery_is_full();

    let mut body = String::from(
        "Revise os retratos gerados. Aprove até 5 para adicioná-los à sua galeria para o passo final.",
    );
    body.push_str(&format!("\n\nAprovados: {approved} / {MAX_APPROVED}"));
    if full {
        body.push('\n');
        body.push_str(MAX_APPROVED_NOTICE);
    }

    let cards = session
        .initial_generations
        .iter()
        .enumerate()
        .map(|(index, image)| render_card(image, full, index + 1))
        .collect();

    let mut nav = vec![Button::new("← Voltar", WizardAction::Back)];
    if approved > 0 {
        nav.push(Button::new("Criar Variações →", WizardAction::CompleteReview));
    }

    StepView {
        title: "Passo 3: Aprove Seus Favoritos".to_string(),
        body,
        buttons: vec![nav],
        cards,
        ..StepView::default()
    }
}

fn download_item(image: &GeneratedImage, caption: &str) -> DownloadItem {
    DownloadItem {
        image_id: image.id.clone(),
        file_name: image.download_file_name(),
        image_data: image.image_data.clone(),
        caption: caption.to_string(),
    }
}

fn render_gallery(session: &Session) -> StepView {
    let mut body = String::from(
        "Aqui estão seus retratos aprovados e suas variações geradas. Baixe seus favoritos!",
    );
    body.push_str(&format!(
        "\n\nOriginais Aprovados: {}",
        session.approved_gallery.len()
    ));
    if !session.variations.is_empty() {
        body.push_str(&format!("\nVariações Geradas: {}", session.variations.len()));
    }

    let downloads = session
        .approved_gallery
        .iter()
        .map(|image| download_item(image, "Original aprovado"))
        .chain(
            session
                .variations
                .iter()
                .map(|image| download_item(image, "Variação")),
        )
        .collect();

    StepView {
        title: "Galeria Final".to_string(),
        body,
        buttons: vec![
            vec![Button::new("Gerar Mais Variações", WizardAction::Variations)],
            vec![Button::new("← Voltar para Aprovações", WizardAction::Back)],
        ],
        downloads,
        ..StepView::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::OriginalImage;

    fn image(status: ImageStatus) -> GeneratedImage {
        GeneratedImage::new("data".into(), "prompt".into(), status, false)
    }

    fn actions(view: &StepView) -> Vec<WizardAction> {
        view.buttons
            .iter()
            .flatten()
            .map(|button| button.action.clone())
            .collect()
    }

    #[test]
    fn callback_data_round_trips_within_limit() {
        let id = uuid::Uuid::new_v4().to_string();
        let all = vec![
            WizardAction::ToggleGlasses,
            WizardAction::Gender(Gender::Mulher),
            WizardAction::Clothing("terno_cinza_claro_camisa_branca".into()),
            WizardAction::Generate,
            WizardAction::Approve(id.clone()),
            WizardAction::Reject(id),
            WizardAction::CompleteReview,
            WizardAction::Variations,
            WizardAction::Back,
            WizardAction::NewProject,
        ];
        for action in all {
            let data = action.encode();
            assert!(data.len() <= MAX_CALLBACK_BYTES, "{data} too long");
            assert_eq!(WizardAction::decode(&data), Some(action));
        }
    }

    #[test]
    fn foreign_callback_data_is_rejected() {
        assert_eq!(WizardAction::decode("image_res:abc|1K"), None);
        assert_eq!(WizardAction::decode("wiz:gender:Outro"), None);
        assert_eq!(WizardAction::decode("wiz:approve:"), None);
        assert_eq!(WizardAction::decode("wiz:back:extra"), None);
    }

    #[test]
    fn upload_view_lists_checklist_and_glasses_state() {
        let mut session = Session::new();
        let view = render(&session);
        for item in QUALITY_CHECKLIST {
            assert!(view.body.contains(item));
        }
        assert_eq!(view.buttons[0][0].label, "⬜ Permitir óculos na foto");
        assert!(!actions(&view).contains(&WizardAction::NewProject));

        session.allow_glasses = true;
        assert_eq!(render(&session).buttons[0][0].label, "✅ Permitir óculos na foto");
    }

    #[test]
    fn configure_view_offers_generate_only_when_ready() {
        let mut session = Session::new();
        session.step = Step::Configure;
        session.original_image = Some(OriginalImage {
            bytes: vec![1],
            mime_type: "image/png".into(),
            base64: "AQ==".into(),
        });
        session.gender = Some(Gender::Homem);
        let view = render(&session);
        assert_eq!(view.preview.as_deref(), Some("data:image/png;base64,AQ=="));
        assert!(!actions(&view).contains(&WizardAction::Generate));
        assert!(actions(&view).contains(&WizardAction::Clothing("terno_bege_camisa_preta".into())));

        session.clothing = Some("terno_bege_camisa_preta".into());
        let view = render(&session);
        assert!(actions(&view).contains(&WizardAction::Generate));
        assert!(view
            .buttons
            .iter()
            .flatten()
            .any(|button| button.label == "✅ Terno Bege, Camisa Preta"));
    }

    #[test]
    fn generate_view_hides_approve_at_capacity() {
        let mut session = Session::new();
        session.step = Step::Generate;
        session.initial_generations = vec![image(ImageStatus::Pending), image(ImageStatus::Rejected)];
        let view = render(&session);
        assert_eq!(view.cards[0].buttons.len(), 2);
        assert!(view.cards[1].buttons.is_empty());
        assert!(view.cards[1].caption.contains("Rejeitado"));
        assert!(!actions(&view).contains(&WizardAction::CompleteReview));

        session.approved_gallery = (0..MAX_APPROVED).map(|_| image(ImageStatus::Approved)).collect();
        let view = render(&session);
        assert!(view.body.contains("Aprovados: 5 / 5"));
        assert!(view.body.contains(MAX_APPROVED_NOTICE));
        assert_eq!(
            view.cards[0].buttons,
            vec![Button::new(
                "❌ Rejeitar",
                WizardAction::Reject(session.initial_generations[0].id.clone())
            )]
        );
        assert!(actions(&view).contains(&WizardAction::CompleteReview));
    }

    #[test]
    fn gallery_view_lists_downloads_in_order() {
        let mut session = Session::new();
        session.step = Step::Gallery;
        session.approved_gallery = vec![image(ImageStatus::Approved)];
        session.variations = vec![GeneratedImage::new(
            "v".into(),
            "p".into(),
            ImageStatus::Approved,
            true,
        )];
        let view = render(&session);
        assert_eq!(view.downloads.len(), 2);
        assert_eq!(view.downloads[0].image_id, session.approved_gallery[0].id);
        assert_eq!(
            view.downloads[1].file_name,
            format!("portrait-{}.png", &session.variations[0].id[..8])
        );
        assert!(actions(&view).contains(&WizardAction::Variations));
    }

    #[test]
    fn loading_replaces_buttons_with_status() {
        let mut session = Session::new();
        session.step = Step::Gallery;
        session.is_loading = true;
        session.loading_message = "Criando variações...".into();
        let view = render(&session);
        assert_eq!(view.status.as_deref(), Some("⏳ Criando variações..."));
        assert_eq!(actions(&view), vec![WizardAction::NewProject]);

        session.is_loading = false;
        session.error = Some("Falha ao gerar variações.".into());
        let view = render(&session);
        assert!(view.text().ends_with("⚠️ Falha ao gerar variações."));
    }
}
