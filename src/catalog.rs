use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Homem,
    Mulher,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Homem, Gender::Mulher];

    pub const fn as_str(self) -> &'static str {
        match self {
            Gender::Homem => "Homem",
            Gender::Mulher => "Mulher",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Gender::Homem => "Masculino",
            Gender::Mulher => "Feminino",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Homem" => Some(Gender::Homem),
            "Mulher" => Some(Gender::Mulher),
            _ => None,
        }
    }

    pub const fn variant_prompt(self) -> &'static str {
        match self {
            Gender::Homem => PROMPT_MASCULINO_VARIANT,
            Gender::Mulher => PROMPT_FEMININO_VARIANT,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClothingOption {
    pub key: &'static str,
    pub name: &'static str,
}

const MEN_CLOTHING: [ClothingOption; 4] = [
    ClothingOption {
        key: "terno_azul_camisa_branca",
        name: "Terno Azul, Camisa Branca",
    },
    ClothingOption {
        key: "terno_bege_camisa_preta",
        name: "Terno Bege, Camisa Preta",
    },
    ClothingOption {
        key: "terno_cinza_claro_camisa_branca",
        name: "Terno Cinza Claro, Camisa Branca",
    },
    ClothingOption {
        key: "terno_arabesco_camisa_preta",
        name: "Terno Estampado, Camisa Preta",
    },
];

const WOMEN_CLOTHING: [ClothingOption; 4] = [
    ClothingOption {
        key: "social_preto",
        name: "Social Preto",
    },
    ClothingOption {
        key: "tons_claros_luxo",
        name: "Tons Claros de Luxo",
    },
    ClothingOption {
        key: "brilho_sutil",
        name: "Tecido com Brilho Sutil",
    },
    ClothingOption {
        key: "cortes_clean",
        name: "Corte Clean",
    },
];

pub fn clothing_options(gender: Gender) -> &'static [ClothingOption] {
    match gender {
        Gender::Homem => &MEN_CLOTHING,
        Gender::Mulher => &WOMEN_CLOTHING,
    }
}

pub fn find_clothing(gender: Gender, key: &str) -> Option<&'static ClothingOption> {
    clothing_options(gender)
        .iter()
        .find(|option| option.key == key)
}

/// Display name for a clothing key, or the key itself when the catalog has no
/// entry for it.
pub fn clothing_name(gender: Gender, key: &str) -> String {
    find_clothing(gender, key)
        .map(|option| option.name.to_string())
        .unwrap_or_else(|| key.to_string())
}

pub fn compose_portrait_prompt(gender: Gender, clothing_key: &str) -> String {
    format!(
        "{} The subject is wearing: {}. {}",
        PROMPT_BASE_COMMON,
        clothing_name(gender, clothing_key),
        gender.variant_prompt()
    )
}

pub const ALTERNATE_ANGLE_SUFFIX: &str = " Use a slightly different camera angle.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariationTier {
    Background,
    BackgroundAndPose,
    BackgroundPoseAndClothing,
}

impl VariationTier {
    pub fn from_number(value: u8) -> Option<Self> {
        match value {
            1 => Some(VariationTier::Background),
            2 => Some(VariationTier::BackgroundAndPose),
            3 => Some(VariationTier::BackgroundPoseAndClothing),
            _ => None,
        }
    }

    pub const fn prompt(self) -> &'static str {
        match self {
            VariationTier::Background => PROMPT_VARIATION_TYPE_1,
            VariationTier::BackgroundAndPose => PROMPT_VARIATION_TYPE_2,
            VariationTier::BackgroundPoseAndClothing => PROMPT_VARIATION_TYPE_3,
        }
    }
}

pub fn validation_prompt(allow_glasses: bool) -> String {
    let face_rule = if allow_glasses {
        "4. rosto_descoberto: O rosto não deve ser coberto por chapéus ou outros objetos, mas óculos de grau são aceitáveis."
    } else {
        "4. rosto_descoberto: O rosto não deve ser coberto por chapéus, óculos de sol ou outros objetos."
    };

    format!(
        "Analise esta imagem para um gerador de retratos profissionais. Verifique estas regras:\n\
1.  face_count: Deve ser exatamente 1.\n\
2.  no_other_people: Não deve haver outras pessoas no fundo.\n\
3.  sharpness: O assunto principal deve estar em foco, não embaçado.\n\
{face_rule}\n\
Responda SOMENTE com um objeto JSON neste formato: {{ \"isValid\": boolean, \"reason\": \"string descrevendo o problema se não for válido\" }}"
    )
}

pub const PROMPT_BASE_COMMON: &str = "professional headshot, studio photography, soft Rembrandt lighting, dark neutral background, extremely sharp, no distracting background, professional appearance, atmosphere of luxury and elegance, controlled low-light, natural expression, editorial quality, hyperrealistic, 8k. The subject's face must be identical to the reference image.";

pub const PROMPT_MASCULINO_VARIANT: &str = "formal men's suit, confident look, upright posture, impeccably tailored suit, visible fabric texture, 3:4 aspect ratio, slight 45-degree angle, lighting that highlights facial contours.";

pub const PROMPT_FEMININO_VARIANT: &str = "formal women's attire in luxury tones, professional soft makeup, elegant hairstyle, serene and confident expression, fine fabric textures, 3:4 aspect ratio, slight 30 to 45-degree angle.";

pub const PROMPT_VARIATION_TYPE_1: &str = "Generate a subtle variation of the provided image, maintaining the original subject's identity and facial features perfectly. Change ONLY the background to a discreet luxury office, dark wood paneling, or a subtle library. Do not alter the subject, their pose, or their clothing.";

pub const PROMPT_VARIATION_TYPE_2: &str = "Generate a subtle variation of the provided image, maintaining the original subject's identity and facial features perfectly. Change the background to a discreet luxury office or dark wood paneling AND introduce a minor change in pose, such as a head tilt of +/- 10 degrees or a slight change in camera angle.";

pub const PROMPT_VARIATION_TYPE_3: &str = "Generate a subtle variation of the provided image, maintaining the original subject's identity and facial features perfectly. Change the background, adjust the pose or camera angle slightly, AND subtly alter the clothing by changing its color or fine details.";
