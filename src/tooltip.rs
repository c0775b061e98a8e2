use clap::ValueEnum;

use crate::geometry;
use crate::record::{Action, LatLng};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Locale {
    #[default]
    En,
    Ru,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Top,
}

/// How a tooltip is anchored to its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooltipOptions {
    /// Shown at all times instead of only on hover.
    pub permanent: bool,
    pub direction: Direction,
}

impl Default for TooltipOptions {
    fn default() -> Self {
        Self {
            permanent: true,
            direction: Direction::Top,
        }
    }
}

struct Strings {
    trees: &'static str,
    action: &'static str,
    area: &'static str,
    planting: &'static str,
    cutting: &'static str,
    unset: &'static str,
    choose_action: &'static str,
    save: &'static str,
}

static EN: Strings = Strings {
    trees: "Trees",
    action: "Action",
    area: "Area",
    planting: "Planting",
    cutting: "Cutting",
    unset: "Not set",
    choose_action: "Choose action",
    save: "Save",
};

static RU: Strings = Strings {
    trees: "Количество деревьев",
    action: "Действие",
    area: "Площадь",
    planting: "Высадка",
    cutting: "Вырубка",
    unset: "Не выбрано",
    choose_action: "Выберите действие",
    save: "Сохранить",
};

impl Locale {
    fn strings(self) -> &'static Strings {
        match self {
            Locale::En => &EN,
            Locale::Ru => &RU,
        }
    }

    pub fn action_name(self, action: Action) -> &'static str {
        let s = self.strings();
        match action {
            Action::Unset => s.unset,
            Action::Planting => s.planting,
            Action::Cutting => s.cutting,
        }
    }

    pub fn trees_caption(self) -> &'static str {
        self.strings().trees
    }

    pub fn action_caption(self) -> &'static str {
        self.strings().action
    }

    /// Placeholder shown while no action is picked.
    pub fn choose_action(self) -> &'static str {
        self.strings().choose_action
    }

    pub fn save(self) -> &'static str {
        self.strings().save
    }
}

/// Tooltip text for an annotated polygon.
pub fn label(count: u32, action: Action, ring: &[LatLng], locale: Locale) -> String {
    let s = locale.strings();
    let area = geometry::geodesic_area(ring);
    format!(
        "{}: {}\n{}: {}\n{}: {:.2} m²",
        s.trees,
        count,
        s.action,
        locale.action_name(action),
        s.area,
        area
    )
}
