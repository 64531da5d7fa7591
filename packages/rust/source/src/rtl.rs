//! Right-to-left preset: the three edits that make a form page honor the
//! active language's text direction.

use localekit_shared::{RtlConfig, Result};

use crate::anchor::Anchor;
use crate::edits::{InsertLine, SourceEdit, TagAttribute};

/// Import the language context, read `isRTL` from it, and add a `dir`
/// attribute to input-like components.
#[derive(Debug, Clone)]
pub struct RtlPreset {
    import: InsertLine,
    hook: InsertLine,
    attribute: TagAttribute,
}

impl RtlPreset {
    pub fn from_config(config: &RtlConfig) -> Result<Self> {
        let import = InsertLine::new(Anchor::literal(config.import_anchor.as_str())?, &config.import_line)
            .with_guard(config.guard.as_str());
        // Every component in the file reads `t`, so each one needs `isRTL`.
        let hook = InsertLine::new(Anchor::literal(config.hook_anchor.as_str())?, &config.hook_line)
            .at_every_match();
        let attribute = TagAttribute::new(config.tags.clone(), config.attribute.as_str())?;
        Ok(Self {
            import,
            hook,
            attribute,
        })
    }

    /// Edits in the order they must run.
    pub fn edits(&self) -> Vec<SourceEdit> {
        vec![
            SourceEdit::InsertLine(self.import.clone()),
            SourceEdit::InsertLine(self.hook.clone()),
            SourceEdit::TagAttribute(self.attribute.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::EditOutcome;
    use crate::file::SourceFile;

    const ONBOARDING: &str = "\
import { useTranslation } from 'react-i18next';
import { Textarea } from '@/components/ui/textarea';

export const StudentOnboarding = () => {
  const { t } = useTranslation();
  return (
    <Textarea
      value={goal}
      placeholder={t('onboarding.goal')}
    />
  );
};
";

    fn preset() -> RtlPreset {
        RtlPreset::from_config(&RtlConfig::default()).expect("default preset")
    }

    fn apply_all(file: &mut SourceFile) -> Vec<EditOutcome> {
        preset()
            .edits()
            .iter()
            .map(|edit| edit.apply(file))
            .collect()
    }

    #[test]
    fn applies_import_hook_and_attribute() {
        let mut file = SourceFile::parse(ONBOARDING);
        let outcomes = apply_all(&mut file);
        assert!(outcomes.iter().all(|o| o.applied() == 1), "{outcomes:?}");

        let text = file.render();
        assert!(text.starts_with(
            "import { useTranslation } from 'react-i18next';\nimport { useLanguage } from '@/contexts/LanguageContext';\n"
        ));
        assert!(text.contains("  const { t } = useTranslation();\n  const { isRTL } = useLanguage();\n"));
        assert!(text.contains("      placeholder={t('onboarding.goal')}\n      dir={isRTL ? 'rtl' : 'ltr'}\n    />"));
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut file = SourceFile::parse(ONBOARDING);
        apply_all(&mut file);
        let once = file.render();

        let outcomes = apply_all(&mut file);
        assert!(outcomes.iter().all(|o| o.applied() == 0));
        assert_eq!(file.render(), once);
    }

    #[test]
    fn hook_goes_into_every_component() {
        let text = "\
import { useTranslation } from 'react-i18next';

const Header = () => {
  const { t } = useTranslation();
  return (
    <Input placeholder={t('search')} />
  );
};

export const Footer = () => {
  const { t } = useTranslation();
  return (
    <Textarea value={note}>{note}</Textarea>
  );
};
";
        let mut file = SourceFile::parse(text);
        let outcomes = apply_all(&mut file);
        assert_eq!(outcomes[1], EditOutcome::Applied(2));
        assert_eq!(outcomes[2], EditOutcome::Applied(2));

        let rendered = file.render();
        assert_eq!(rendered.matches("const { isRTL } = useLanguage();").count(), 2);
        assert!(rendered.contains("<Input placeholder={t('search')} dir={isRTL ? 'rtl' : 'ltr'} />"));
        assert!(rendered.contains("<Textarea value={note} dir={isRTL ? 'rtl' : 'ltr'}>{note}</Textarea>"));

        let again = apply_all(&mut file);
        assert!(again.iter().all(|o| o.applied() == 0));
    }
}
