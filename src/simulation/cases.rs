//! Built-in patient cases shipped with the binary.

use crate::simulation::fixture::{CaseFixture, ResponseRule};

fn rule(key: &str, pattern: &str, response: &str) -> ResponseRule {
    ResponseRule {
        key: key.to_string(),
        pattern: pattern.to_string(),
        response: response.to_string(),
        repeat_response: None,
    }
}

fn rule_with_repeat(key: &str, pattern: &str, response: &str, repeat: &str) -> ResponseRule {
    ResponseRule {
        repeat_response: Some(repeat.to_string()),
        ..rule(key, pattern, response)
    }
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

const COMPLAINT_PATTERN: &str =
    r"what brings you|what('s| is) (wrong|the (problem|matter))|how can i help|tell me what happened";

pub fn builtin_fixtures() -> Vec<CaseFixture> {
    vec![dengue(), chest_pain(), leptospirosis()]
}

fn dengue() -> CaseFixture {
    CaseFixture {
        case_type: "dengue".to_string(),
        title: "Fever in Kelaniya".to_string(),
        summary: "A 24-year-old university student with four days of high fever during the monsoon."
            .to_string(),
        initial_prompt: "Doctor, I've had a very high fever for four days now. My whole body aches and I feel terrible."
            .to_string(),
        expected_diagnosis: "dengue fever".to_string(),
        accepted_aliases: aliases(&["dengue", "dhf", "dengue haemorrhagic fever"]),
        score_increment: 2,
        rules: vec![
            rule_with_repeat(
                "complaint",
                COMPLAINT_PATTERN,
                "The fever came on suddenly four days ago. It goes up to 40 degrees and paracetamol only helps for a few hours.",
                "Like I said, it's this fever. Four days now and it just won't settle.",
            ),
            rule(
                "onset",
                r"when did|how long|since when|start",
                "It started on Monday evening, quite suddenly. I was perfectly fine that morning.",
            ),
            rule(
                "bleeding",
                r"bleed|gum|nose|blood|bruis",
                "Now that you ask, my gums bled a little when I brushed this morning.",
            ),
            rule(
                "rash",
                r"rash|skin|spots|itch",
                "There are tiny red spots on my legs since yesterday. They don't fade when I press them.",
            ),
            rule_with_repeat(
                "pain",
                r"pain|ache|hurt|head",
                "My head is pounding, mostly behind my eyes. My back and joints ache so much I can hardly get up.",
                "It's still the headache behind my eyes, and the body aches.",
            ),
            rule(
                "abdomen",
                r"vomit|nause|appetite|eat|stomach|abdom|tummy",
                "I've vomited three times today and can't keep food down. My tummy is sore on the right side.",
            ),
            rule(
                "exposure",
                r"travel|mosquito|neighbo|anyone else|contact|where do you live",
                "I stay in a boarding house near Kelaniya. Two people down the lane were admitted with fever last week, and there are mosquitoes everywhere.",
            ),
            rule(
                "urine",
                r"urine|pee|pass(ed|ing)? water|drink|fluid",
                "I haven't passed much urine today. I've been trying to drink king coconut water.",
            ),
            rule(
                "medication",
                r"medic|tablet|drug|taken anything|aspirin|ibuprofen",
                "Only paracetamol. A friend gave me some ibuprofen but I haven't taken it.",
            ),
        ],
        fallback_response: "I'm not sure, doctor. I just feel so weak and feverish.".to_string(),
    }
}

fn chest_pain() -> CaseFixture {
    CaseFixture {
        case_type: "chest_pain".to_string(),
        title: "Crushing chest pain".to_string(),
        summary: "A 58-year-old bus driver brought in with chest pain that began an hour ago.".to_string(),
        initial_prompt: "Doctor, there's a terrible pressure in my chest. It started about an hour ago while I was driving."
            .to_string(),
        expected_diagnosis: "myocardial infarction".to_string(),
        accepted_aliases: aliases(&[
            "heart attack",
            "stemi",
            "acute coronary syndrome",
            "myocardial infarct",
        ]),
        score_increment: 3,
        rules: vec![
            rule_with_repeat(
                "complaint",
                COMPLAINT_PATTERN,
                "It's this pain in the middle of my chest. It came on while I was driving the Kandy bus.",
                "The chest pain, doctor. It hasn't let up at all.",
            ),
            // Before "character" so blood-pressure questions land here
            rule(
                "history",
                r"blood pressure|diabet|sugar|cholesterol|medical history|illness",
                "I have sugar for ten years and the doctor said my pressure was high, but I don't check it often.",
            ),
            rule(
                "character",
                r"describe|feel like|what kind|character|sharp|dull|pressure|heavy",
                "It's heavy and squeezing, like an elephant sitting on my chest.",
            ),
            rule(
                "radiation",
                r"spread|radiat|arm|jaw|neck|anywhere else",
                "It goes down my left arm and up into my jaw.",
            ),
            rule(
                "onset",
                r"when did|how long|start|sudden",
                "About an hour ago. It came on suddenly at a traffic light.",
            ),
            rule(
                "associated",
                r"sweat|breath|sick|nause|vomit|dizz|faint",
                "I'm sweating a lot and I feel sick. A bit short of breath too.",
            ),
            rule(
                "smoking",
                r"smok|cigarette|beedi|alcohol|drink",
                "I smoke about twenty beedi a day, for thirty years now. Only a little arrack at weddings.",
            ),
            rule(
                "family",
                r"family|father|mother|brother|sister",
                "My father died of a heart attack when he was sixty.",
            ),
            rule(
                "relief",
                r"rest|reliev|better|worse",
                "Resting doesn't help at all. It's been constant since it started.",
            ),
            rule(
                "medication",
                r"medic|tablet|drug|taking",
                "I take metformin for the sugar, but I ran out last month.",
            ),
        ],
        fallback_response: "Please doctor, the pain is very bad, I can't think properly.".to_string(),
    }
}

fn leptospirosis() -> CaseFixture {
    CaseFixture {
        case_type: "leptospirosis".to_string(),
        title: "Fever after the floods".to_string(),
        summary: "A 35-year-old paddy farmer from Polonnaruwa with fever, muscle pains and little urine."
            .to_string(),
        initial_prompt: "I've had fever and terrible pains in my legs for five days, doctor. I can barely walk."
            .to_string(),
        expected_diagnosis: "leptospirosis".to_string(),
        accepted_aliases: aliases(&["weil's disease", "weil disease", "rat fever"]),
        score_increment: 2,
        rules: vec![
            rule_with_repeat(
                "complaint",
                COMPLAINT_PATTERN,
                "High fever with chills for five days, and my legs hurt so much.",
                "As I told you, the fever and the leg pains.",
            ),
            rule(
                "pain",
                r"pain|ache|muscle|calf|calves|leg",
                "My calves are the worst. Even touching them hurts.",
            ),
            rule(
                "occupation",
                r"work|job|occupation|farm|paddy|field",
                "I work in the paddy fields. After the rains the fields flooded and I was working in the water without boots.",
            ),
            // Ahead of "exposure", which also matches "water"
            rule(
                "urine",
                r"urine|pee|pass(ed|ing)? water",
                "I've passed very little urine since yesterday, and it's dark.",
            ),
            rule(
                "exposure",
                r"water|flood|swim|\brats?\b|animal|cattle|\bcut|wound",
                "There was flood water everywhere and plenty of rats around the storehouse. I have a cut on my foot too.",
            ),
            rule(
                "eyes",
                r"eye|yellow|jaundice|\bred\b",
                "My wife says my eyes are red, and today they look a little yellow.",
            ),
            rule(
                "onset",
                r"when did|how long|since when|start",
                "It started five days ago with shivering and fever.",
            ),
            rule(
                "medication",
                r"medic|tablet|drug|taken anything|doxy",
                "Only paracetamol from the pharmacy.",
            ),
        ],
        fallback_response: "I don't know, doctor. The fever and the leg pains are all I can think about."
            .to_string(),
    }
}
