use std::fmt::{self, Display, Formatter};

use log::{error, info, warn};

use crate::structs::command::{WindowBitmap, WindowDefinition, WindowStyle};
use crate::structs::packet::MAX_SERVICE_NUMBER;
use crate::structs::timestamp::CaptionTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionStyle {
    PopOn,
    RollUp,
    TickerTape,
}

impl CaptionStyle {
    const ALL: [Self; 3] = [Self::PopOn, Self::RollUp, Self::TickerTape];

    /// Predefined window styles 1–3 are pop-on, 4–6 roll-up, 7 ticker tape
    /// (stored here as 0–6).
    pub fn from_window_style(style: WindowStyle) -> Option<Self> {
        match style.0 {
            0..=2 => Some(Self::PopOn),
            3..=5 => Some(Self::RollUp),
            6 => Some(Self::TickerTape),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::PopOn => 1,
            Self::RollUp => 2,
            Self::TickerTape => 4,
        }
    }
}

impl Display for CaptionStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PopOn => "PopOn",
            Self::RollUp => "RollUp",
            Self::TickerTape => "TickerTape",
        })
    }
}

/// Styles seen on one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStyle {
    seen: u8,
    pub ambiguous: bool,
    pub captioning_started: bool,
}

impl ServiceStyle {
    pub fn has(&self, style: CaptionStyle) -> bool {
        self.seen & style.bit() != 0
    }

    /// The style this service settled on, if exactly one was seen.
    pub fn style(&self) -> Option<CaptionStyle> {
        if self.ambiguous {
            return None;
        }
        CaptionStyle::ALL.into_iter().find(|&style| self.has(style))
    }
}

impl Display for ServiceStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PopOn - {}; RollUp - {}; TickerTape - {}",
            self.has(CaptionStyle::PopOn) as u8,
            self.has(CaptionStyle::RollUp) as u8,
            self.has(CaptionStyle::TickerTape) as u8,
        )
    }
}

/// Tracks which caption style each service uses, from its window definitions.
///
/// Purely diagnostic: nothing here feeds back into decoding.
#[derive(Debug)]
pub struct StyleClassifier {
    services: [ServiceStyle; MAX_SERVICE_NUMBER as usize],
    ambiguous: usize,
}

impl Default for StyleClassifier {
    fn default() -> Self {
        Self {
            services: [ServiceStyle::default(); MAX_SERVICE_NUMBER as usize],
            ambiguous: 0,
        }
    }
}

impl StyleClassifier {
    pub fn service(&self, service: u8) -> Option<&ServiceStyle> {
        (service as usize)
            .checked_sub(1)
            .and_then(|i| self.services.get(i))
    }

    fn service_mut(&mut self, service: u8) -> Option<&mut ServiceStyle> {
        (service as usize)
            .checked_sub(1)
            .and_then(|i| self.services.get_mut(i))
    }

    /// Number of services that switched style at least once.
    pub fn ambiguous_services(&self) -> usize {
        self.ambiguous
    }

    pub fn observe_window(&mut self, service: u8, definition: &WindowDefinition) {
        let Some(entry) = self.service_mut(service) else {
            return;
        };
        if entry.ambiguous {
            return;
        }

        let Some(style) = CaptionStyle::from_window_style(definition.window_style) else {
            error!(
                "Unexpected window style on service {service}: {}",
                definition.window_style.0
            );
            return;
        };

        let mut changed = false;
        for previous in CaptionStyle::ALL {
            if previous != style && entry.has(previous) {
                warn!("Caption format change on service {service}: {previous} -> {style}");
                changed = true;
            }
        }
        entry.seen |= style.bit();

        if changed {
            entry.ambiguous = true;
            self.ambiguous += 1;
        }
    }

    /// Notes the first DisplayWindows or ToggleWindows that shows anything.
    pub fn observe_display(&mut self, service: u8, windows: WindowBitmap, time: CaptionTime) {
        let Some(entry) = self.service_mut(service) else {
            return;
        };
        if windows.0 != 0 && !entry.captioning_started {
            entry.captioning_started = true;
            info!("DTVCC captioning on service {service} started at {time}");
        }
    }

    /// Logs one line per service set in `active` (bit n = service n + 1).
    pub fn report(&self, active: u64) {
        for (i, entry) in self.services.iter().enumerate() {
            if active & (1 << i) == 0 {
                continue;
            }
            let service = i + 1;

            match entry.style() {
                Some(style) => info!("Found DTVCC {style} Captioning on service {service}"),
                None if entry.ambiguous => {
                    info!("Ambiguous DTVCC captioning type on service {service}: {entry}")
                }
                None => warn!("Unset DTVCC captioning type on service {service}: {entry}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(style: u8) -> WindowDefinition {
        WindowDefinition {
            window_style: WindowStyle(style),
            ..Default::default()
        }
    }

    #[test]
    fn first_definition_sets_style() {
        let mut classifier = StyleClassifier::default();

        classifier.observe_window(1, &window(3));
        classifier.observe_window(1, &window(5));
        classifier.observe_window(2, &window(6));

        assert_eq!(classifier.service(1).and_then(ServiceStyle::style), Some(CaptionStyle::RollUp));
        assert_eq!(
            classifier.service(2).and_then(ServiceStyle::style),
            Some(CaptionStyle::TickerTape)
        );
        assert_eq!(classifier.service(3).and_then(ServiceStyle::style), None);
        assert_eq!(classifier.ambiguous_services(), 0);
    }

    #[test]
    fn style_change_is_ambiguous_for_good() {
        let mut classifier = StyleClassifier::default();

        classifier.observe_window(4, &window(0));
        classifier.observe_window(4, &window(3));
        classifier.observe_window(4, &window(0));
        classifier.observe_window(4, &window(6));

        let entry = classifier.service(4).copied().unwrap_or_default();
        assert!(entry.ambiguous);
        assert_eq!(entry.style(), None);
        assert!(entry.has(CaptionStyle::PopOn) && entry.has(CaptionStyle::RollUp));
        assert!(!entry.has(CaptionStyle::TickerTape));
        assert_eq!(classifier.ambiguous_services(), 1);
        assert_eq!(entry.to_string(), "PopOn - 1; RollUp - 1; TickerTape - 0");
    }

    #[test]
    fn captioning_start() {
        let mut classifier = StyleClassifier::default();
        let time = CaptionTime::default();

        classifier.observe_display(1, WindowBitmap(0), time);
        assert!(!classifier.service(1).is_some_and(|s| s.captioning_started));

        classifier.observe_display(1, WindowBitmap(0x01), time);
        assert!(classifier.service(1).is_some_and(|s| s.captioning_started));

        // Out of range services are ignored.
        classifier.observe_display(0, WindowBitmap(0x01), time);
        classifier.observe_window(64, &window(0));
        assert!(classifier.service(64).is_none());
    }
}
