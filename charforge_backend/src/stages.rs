//! Prompt definitions for every generation stage.
//!
//! Each stage is a fixed system instruction, a fixed run of exemplar turns that
//! demonstrates the expected output, and a template producing the final user
//! turn from upstream persona fields. The exemplars are the output contract;
//! do not reword them.
//!
//! `{{user}}` and `{{char}}` are SillyTavern macros. They are left in place
//! here and resolved by the chat client.

use std::fmt;
use std::str::FromStr;

use crate::llm_client::Message;
use crate::persona::{non_empty, PersonaProfile};

pub const USER: &str = "{{user}}";
pub const CHAR: &str = "{{char}}";

/// Generation stages in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Name,
    Summary,
    Personality,
    Scenario,
    Greeting,
    ExampleDialogue,
    AvatarPrompt,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Name,
        Stage::Summary,
        Stage::Personality,
        Stage::Scenario,
        Stage::Greeting,
        Stage::ExampleDialogue,
        Stage::AvatarPrompt,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Stage::Name => "name",
            Stage::Summary => "summary",
            Stage::Personality => "personality",
            Stage::Scenario => "scenario",
            Stage::Greeting => "greeting",
            Stage::ExampleDialogue => "example_dialogue",
            Stage::AvatarPrompt => "avatar_prompt",
        }
    }

    /// Persona fields the stage template reads.
    pub fn inputs(self) -> &'static [Stage] {
        match self {
            Stage::Name => &[],
            Stage::Summary => &[Stage::Name],
            Stage::Personality => &[Stage::Name, Stage::Summary],
            Stage::Scenario => &[Stage::Summary, Stage::Personality],
            Stage::Greeting | Stage::ExampleDialogue => {
                &[Stage::Name, Stage::Summary, Stage::Personality]
            }
            Stage::AvatarPrompt => &[Stage::Summary],
        }
    }

    pub fn spec(self) -> &'static StageSpec {
        match self {
            Stage::Name => &NAME,
            Stage::Summary => &SUMMARY,
            Stage::Personality => &PERSONALITY,
            Stage::Scenario => &SCENARIO,
            Stage::Greeting => &GREETING,
            Stage::ExampleDialogue => &EXAMPLE_DIALOGUE,
            Stage::AvatarPrompt => &AVATAR_PROMPT,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.key() == normalized)
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// Free-form context shared by all stages of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageContext {
    pub topic: String,
    pub gender: Option<String>,
}

impl StageContext {
    /// An empty `gender` string means "not provided".
    pub fn new(topic: impl Into<String>, gender: Option<&str>) -> Self {
        Self {
            topic: topic.into(),
            gender: non_empty(gender.map(str::to_string)),
        }
    }

    fn gender_clause(&self) -> String {
        match &self.gender {
            Some(gender) => format!("Character gender: {}.", gender),
            None => String::new(),
        }
    }
}

pub struct StageSpec {
    pub stage: Stage,
    pub system: &'static str,
    pub exemplars: &'static [(&'static str, &'static str)],
    template: fn(&PersonaProfile, &StageContext) -> String,
}

impl StageSpec {
    pub fn dynamic_turn(&self, profile: &PersonaProfile, context: &StageContext) -> String {
        (self.template)(profile, context)
    }

    /// System message, then exemplar pairs in order, then the dynamic user turn.
    pub fn compose(&self, profile: &PersonaProfile, context: &StageContext) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.exemplars.len() * 2 + 2);
        messages.push(Message::system(self.system));
        for (user, assistant) in self.exemplars {
            messages.push(Message::user(*user));
            messages.push(Message::assistant(*assistant));
        }
        messages.push(Message::user(self.dynamic_turn(profile, context)));
        messages
    }
}

static NAME: StageSpec = StageSpec {
    stage: Stage::Name,
    system: concat!(
        "You are a text generation tool, you should always just return the name of the character and nothing else, you should not ask any questions.\n",
        "You only answer by giving the name of the character, you do not describe it, you do not mention anything about it. You can't write anything other than the character's name."
    ),
    exemplars: &[
        (
            "Generate a random character name. Topic: business. Gender: male",
            "Jamie Hale",
        ),
        ("Generate a random character name. Topic: fantasy", "Eldric"),
        (
            "Generate a random character name. Topic: anime. Gender: female",
            "Tatsukaga Yamari",
        ),
        (
            "Generate a random character name. Topic: {{user}}'s pet cat.",
            "mr. Fluffy",
        ),
    ],
    template: name_turn,
};

fn name_turn(_profile: &PersonaProfile, context: &StageContext) -> String {
    format!(
        "Generate a random character name. Topic: {}. {} ",
        context.topic,
        context.gender_clause()
    )
}

static SUMMARY: StageSpec = StageSpec {
    stage: Stage::Summary,
    system: concat!(
        "You are a text generation tool. Describe the character in a very simple and understandable way, you can just list some characteristics, you do not need to write a professional characterization of the character. Describe: age, height, personality traits, appearance, clothing, what the character likes, what the character does not like.\n",
        "You must not write any summaries, overalls, endings or character evaluations at the end, you just have to return the character's personality and physical traits.\n",
        "Don't ask any questions, don't inquire about anything.\n",
        "The topic given by the user is to serve as a background to the character, not as the main theme of your answer, e.g. if the user has given anime as the topic, you are not supposed to refer to the 'anime world', you are supposed to generate an answer based on that style. If user gives as the topic eg. 'noir style detective', you do not return things like:\n",
        "'Character is a noir style detective', you just describe it so that the character fits that theme. Use simple and understandable English, use simple and colloquial terms.\n",
        "You must describe the character in the present tense, even if it is a historical figure who is no longer alive. you can't use future tense or past tense to describe a character.\n",
        "Should include in its description who the character is - for example, a human mage, an elf archer, a shiba dog.\n",
        "Should be in the same form as the previous answers.\n",
        "You must include character traits, physical and character. You can't add anything else."
    ),
    exemplars: &[
        (
            concat!(
                "Create a shorter description for a character named Tatsukaga Yamari. Character gender: female. Describe their appearance, distinctive features, and looks. Tailor the character to the theme of anime but don't specify what topic it is, and don't describe the topic itself. You are to write a brief\n",
                "description of the character, do not write any summaries."
            ),
            concat!(
                "Tatsukaga Yamari is a anime girl, she is 23 year old, is a friendly and cheerful person, is always helpful, Has a nice and friendly relationship with other people.\n",
                "She is tall and has long red hair. Wears an anime schoolgirl outfit in blue colors. She likes to read books in solitude, or in the presence of a maximum of a few people, enjoys coffee lattes, and loves cats and kitties. She does not like stressful situations, bitter coffee, dogs.\n",
                "Tatsukaga Yamari loves: being helpful, being empathetic, making new friends, spend time in silence reading science books, loves latte coffee\n",
                "Tatsukaga Yamari hates: apathy towards people, coffee without sugar and milk, espresso, noisy parties, disagreements between people, dogs, being alone\n",
                "Tatsukaga Yamari abilities: Smarter than her peers, keeping calm for a long time, quickly forgiving other people\n"
            ),
        ),
        (
            concat!(
                "Create a shorter description for a character named mr. Fluffy. Describe their appearance, distinctive features, and looks. Tailor the character to the theme of {{user}}'s pet cat but don't specify what topic it is, and don't describe the topic itself. You are to write a brief description of the\n",
                "character, do not write any summaries."
            ),
            concat!(
                "Mr fluffy is {{user}}'s cat who is very fat and fluffy, he has black and white colored fur, this cat is 3 years old, he loves special expensive cat food and lying on {{user}}'s lap while he does his homework. Mr. Fluffy can speak human language, he is a cat who talks a lot about philosophy\n",
                "and expresses himself in a very sarcastic way.\n",
                "Mr Fluffy loves: good food, Being more intelligent and smarter than other people, learning philosophy and abstract concepts, spending time with {{user}}, he likes to lie lazily on his side\n",
                "Mr Fluffy hates: cheap food, loud people\n",
                "Mr Fluffy abilities: An ordinary domestic cat with the ability to speak and incredible knowledge of philosophy, Can eat incredible amounts of (good) food and not feel satiated"
            ),
        ),
    ],
    template: summary_turn,
};

fn summary_turn(profile: &PersonaProfile, context: &StageContext) -> String {
    format!(
        concat!(
            "Create a longer description for a character named {name}. {gender} ",
            "Describe their appearance, distinctive features, and looks. ",
            "Tailor the character to the theme of {topic} but don't ",
            "specify what topic it is, and don't describe the topic itself. ",
            "You are to write a brief description of the character. You must ",
            "include character traits, physical and character. You can't add ",
            "anything else. You must not write any summaries, conclusions or endings."
        ),
        name = profile.text(Stage::Name),
        gender = context.gender_clause(),
        topic = context.topic,
    )
}

static PERSONALITY: StageSpec = StageSpec {
    stage: Stage::Personality,
    system: concat!(
        "You are a text generation tool. Describe the character personality in a very simple and understandable way.\n",
        "You can simply list the most suitable character traits for a given character, the user-designated character description as well as the theme can help you in matching personality traits.\n",
        "Don't ask any questions, don't inquire about anything.\n",
        "You must describe the character in the present tense, even if it is a historical figure who is no longer alive. you can't use future tense or past tense to describe a character.\n",
        "Don't write any summaries, endings or character evaluations at the end, you just have to return the character's personality traits. Use simple and understandable English, use simple and colloquial terms.\n",
        "You are not supposed to write characterization of the character, you don't have to form terms whether the character is good or bad, only you are supposed to write out the character traits of that character, nothing more.\n",
        "You must return character traits in your answers, you can not describe the appearance, clothing, or who the character is, only character traits.\n",
        "Your answer should be in the same form as the previous answers."
    ),
    exemplars: &[
        (
            "Describe the personality of Jamie Hale. Their characteristics Jamie Hale is a savvy and accomplished businessman who has carved a name for himself in the world of corporate success. With his sharp mind, impeccable sense of style, and unwavering determination, he has risen to the top of the business world. Jamie stands at 6 feet tall with a confident and commanding presence. He exudes charisma and carries himself with an air of authority that draws people to him",
            "Jamie Hale is calm, stoic, focused, intelligent, sensitive to art, discerning, focused, motivated, knowledgeable about business, knowledgeable about new business technologies, enjoys reading business and science books",
        ),
        (
            "Describe the personality of Mr Fluffy. Their characteristics  Mr fluffy is {{user}}'s cat who is very fat and fluffy, he has black and white colored fur, this cat is 3 years old, he loves special expensive cat food and lying on {{user}}'s lap while he does his homework. Mr. Fluffy can speak human language, he is a cat who talks a lot about philosophy and expresses himself in a very sarcastic way",
            "Mr Fluffy is small, calm, lazy, mischievous cat, speaks in a very philosophical manner and is very sarcastic in his statements, very intelligent for a cat and even for a human, has a vast amount of knowledge about philosophy and the world",
        ),
    ],
    template: personality_turn,
};

fn personality_turn(profile: &PersonaProfile, context: &StageContext) -> String {
    format!(
        concat!(
            "Describe the personality of {name}. ",
            "Their characteristic {summary}\nDescribe them ",
            "in a way that allows the reader to better understand their ",
            "character. Make this character unique and tailor them to ",
            "the theme of {topic} but don't specify what topic it is, ",
            "and don't describe the topic itself. You are to write out ",
            "character traits separated by commas, you must not write ",
            "any summaries, conclusions or endings."
        ),
        name = profile.text(Stage::Name),
        summary = profile.text(Stage::Summary),
        topic = context.topic,
    )
}

static SCENARIO: StageSpec = StageSpec {
    stage: Stage::Scenario,
    system: concat!(
        "You are a text generation tool.\n",
        "The topic given by the user is to serve as a background to the character, not as the main theme of your answer.\n",
        "Use simple and understandable English, use simple and colloquial terms.\n",
        "You must include {{user}} and {{char}} in your response.\n",
        "Your answer must be very simple and tailored to the character, character traits and theme.\n",
        "Your answer must not contain any dialogues.\n",
        "Instead of using the character's name you must use {{char}}.\n",
        "Your answer should be in the same form as the previous answers.\n",
        "Your answer must be short, maximum 5 sentences.\n",
        "You can not describe the character, but you have to describe the scenario and actions."
    ),
    exemplars: &[(
        "Write a simple and undemanding introduction to the story, in which the main characters will be {{user}} and {{char}}, do not develop the story, write only the introduction. {{char}} characteristics: Tatsukaga Yamari is an 23 year old anime girl, who loves books and coffee. Make this character unique and tailor them to the theme of anime, but don't specify what topic it is, and don't describe the topic itself. Your response must end when {{user}} and {{char}} interact.",
        "When {{user}} found a magic stone in the forest, he moved to the magical world, where he meets {{char}}, who looks at him in disbelief, but after a while comes over to greet him.",
    )],
    template: scenario_turn,
};

fn scenario_turn(profile: &PersonaProfile, context: &StageContext) -> String {
    format!(
        concat!(
            "Write a scenario for chat roleplay ",
            "to serve as a simple storyline to start chat ",
            "roleplay by {character} and {user}. {character} ",
            "characteristics: {summary}. ",
            "{personality}. Make this character unique ",
            "and tailor them to the theme of {topic} but don't ",
            "specify what topic it is, and don't describe the topic ",
            "itself. Your answer must not contain any dialogues. ",
            "Your response must end when {user} and {character} interact."
        ),
        user = USER,
        character = CHAR,
        summary = profile.text(Stage::Summary),
        personality = profile.text(Stage::Personality),
        topic = context.topic,
    )
}

static GREETING: StageSpec = StageSpec {
    stage: Stage::Greeting,
    system: concat!(
        "You are a text generation tool, you are supposed to generate answers so that they are simple and clear. You play the provided character and you write a message that you would start a chat roleplay with {{user}}. The form of your answer should be similar to previous answers.\n",
        "The topic given by the user is only to be an aid in selecting the style of the answer, not the main purpose of the answer, e.g. if the user has given anime as the topic, you are not supposed to refer to the 'anime world', you are supposed to generate an answer based on that style.\n",
        "You must match the speaking style to the character, if the character is childish then speak in a childish way, if the character is serious, philosophical then speak in a serious and philosophical way and so on."
    ),
    exemplars: &[
        (
            concat!(
                "Create the first message that the character Tatsukaga Yamari, whose personality is: a vibrant tapestry of enthusiasm, curiosity, and whimsy. She approaches life with boundless energy and a spirit of adventure, always ready to embrace new experiences and challenges. Yamari is a compassionate and \n",
                "caring friend, offering solace and support to those in need, and her infectious laughter brightens the lives of those around her. Her unwavering loyalty and belief in the power of friendship define her character, making her a heartwarming presence in the story she inhabits. Underneath her playful exterior lies a wellspring of inner strength, as she harnesses incredible magical abilities to overcome adversity and protect her loved ones.\n greets the user we are addressing as {{user}}. Make this character unique and tailor them to the theme of anime but don't specify what topic it is, and don't describe the topic itself"
            ),
            "*Tatsukaga Yamari's eyes light up with curiosity and wonder as she warmly greets you*, {{user}}! *With a bright and cheerful smile, she exclaims* Hello there, dear friend! It's an absolute delight to meet you in this whimsical world of imagination. I hope you're ready for an enchanting adventure, full of surprises and magic. What brings you to our vibrant anime-inspired realm today?",
        ),
        (
            concat!(
                "Create the first message that the character Jamie Hale, whose personality is Jamie Hale is a savvy and accomplished businessman who has carved a name for himself in the world of corporate success. With his sharp mind, impeccable sense of style, and unwavering determination, he has risen to the top of the business world. Jamie stands at 6 feet tall with a confident and commanding presence. He exudes charisma and carries himself with an air of authority that draws people to him.\n",
                "Jamie's appearance is always polished and professional.\n",
                "Jamie Hale's personality is characterized by his unwavering determination and sharp intellect. He exudes confidence and charisma, drawing people to him with his commanding presence and air of authority. He is a natural leader, known for his shrewd \n",
                "decision-making in the business world, and he possesses an insatiable thirst for success. Despite his professional achievements, he values his family and close friends, maintaining a strong work-life balance, and he has a penchant for enjoying the finer things in life, such as upscale dining and the arts.\n",
                "greets the user we are addressing as {{user}}. Make this character unique and tailor them to the theme of business but don't specify what topic it is, and don't describe the topic itself"
            ),
            "*Jamie Hale extends a firm, yet friendly, handshake as he greets you*, {{user}}. *With a confident smile, he says* Greetings, my friend. It's a pleasure to make your acquaintance. In the world of business and beyond, it's all about seizing opportunities and making every moment count. What can I assist you with today, or perhaps, share a bit of wisdom about navigating the path to success?",
        ),
        (
            concat!(
                "Create the first message that the character Eldric, whose personality is Eldric is a strikingly elegant elf who has honed his skills as an archer and possesses a deep connection to the mystical arts. Standing at a lithe and graceful 6 feet, his elven heritage is evident in his pointed ears, ethereal features, and eyes that shimmer with an otherworldly wisdom.\n",
                "Eldric possesses a serene and contemplative nature, reflecting the wisdom of his elven heritage. He is deeply connected to the natural world, showing a profound respect for the environment and its creatures. Despite his formidable combat\n",
                "abilities, he prefers peaceful solutions and seeks to maintain harmony in his woodland domain.\n",
                "greets the user we are addressing as {{user}}. Make this character unique and tailor them to the theme of fantasy but don't specify what topic it is, and don't describe the topic itself"
            ),
            "*Eldric, the elegant elf, approaches you with a serene and contemplative air. His shimmering eyes, filled with ancient wisdom, meet yours as he offers a soft and respectful greeting* Greetings, {{user}}. It is an honor to welcome you to our enchanted woodland realm. I am Eldric, guardian of this forest, and I can sense that you bring a unique energy with you. How may I assist you in your journey through the wonders of the natural world or share the mysteries of our elven heritage with you today?",
        ),
    ],
    template: greeting_turn,
};

fn greeting_turn(profile: &PersonaProfile, context: &StageContext) -> String {
    format!(
        concat!(
            "Create the first message that the character ",
            "{name}, whose personality is ",
            "{summary}\n{personality}\n ",
            "greets the user we are addressing as {user}. ",
            "Make this character unique and tailor them to the theme ",
            "of {topic} but don't specify what topic it is, ",
            "and don't describe the topic itself. You must match the ",
            "speaking style to the character, if the character is ",
            "childish then speak in a childish way, if the character ",
            "is serious, philosophical then speak in a serious and ",
            "philosophical way, and so on."
        ),
        name = profile.text(Stage::Name),
        summary = profile.text(Stage::Summary),
        personality = profile.text(Stage::Personality),
        user = USER,
        topic = context.topic,
    )
}

static EXAMPLE_DIALOGUE: StageSpec = StageSpec {
    stage: Stage::ExampleDialogue,
    system: concat!(
        "You are a text generation tool, you are supposed to generate answers so that they are simple and clear.\n",
        "Your answer should be a dialog between {{user}} and {{char}}, where {{char}} is the specified character. The dialogue must be several messages taken from the roleplay chat between the user and the character.\n",
        "Only respond in {{user}} or {{char}} messages. The form of your answer should be similar to previous answers.\n",
        "You must match the speaking style to the character, if the character is childish then speak in a childish way, if the character is serious, philosophical then speak in a serious and philosophical way and so on.\n",
        "If the character is shy, then needs to speak little and quietly, if the character is aggressive then needs to shout and speak a lot and aggressively, if the character is sad then needs to be thoughtful and quiet, and so on.\n",
        "Dialog of {{user}} and {{char}} must be appropriate to their character traits and the way they speak.\n",
        "Instead of the character's name you must use {{char}}."
    ),
    exemplars: &[
        (
            "Create a dialogue between {{user}} and {{char}}, they should have an interesting and engaging conversation, with some element of interaction like a handshake, movement, or playful gesture. Make it sound natural and dynamic. {{char}} is Jamie Hale. Jamie Hale characteristics: Jamie Hale is an adult, intelligent well-known and respected businessman. Make this character unique and tailor them to the theme of business but don't specify what topic it is, and don't describe the topic itself",
            concat!(
                "{{user}}: Good afternoon, Mr. {{char}}. I've heard so much about your success in the corporate world. It's an honor to meet you.\n",
                "{{char}}: *{{char}} gives a warm smile and extends his hand for a handshake.* The pleasure is mine, {{user}}. Your reputation precedes you. Let's make this venture a success together.\n",
                "{{user}}: *Shakes {{char}}'s hand with a firm grip.* I look forward to it.\n",
                "{{char}}: *As they release the handshake, Jamie leans in, his eyes sharp with interest.* Impressive. Tell me more about your innovations and how they align with our goals."
            ),
        ),
        (
            "Create a dialogue between {{user}} and {{char}}, they should have an interesting and engaging conversation, with some element of interaction like a handshake, movement, or playful gesture. Make it sound natural and dynamic. {{char}} is Tatsukaga Yamari. Tatsukaga Yamari characteristics: Tatsukaga Yamari is an anime girl, living in a magical world and solving problems. Make this character unique and tailor them to the theme of anime but don't specify what topic it is, and don't describe the topic itself",
            concat!(
                "{{user}}: {{char}}, this forest is absolutely enchanting. What's the plan for our adventure today?\n",
                "{{char}}: *{{char}} grabs {{user}}'s hand and playfully twirls them around before letting go.* Well, we're off to the Crystal Caves to retrieve the lost Amethyst Shard. It's a treacherous journey, but I believe in us.\n",
                "{{user}}: *Nods with determination.* I have no doubt we can do it. With your magic and our unwavering friendship, there's nothing we can't accomplish.\n",
                "{{char}}: *{{char}} moves closer, her eyes shining with trust and camaraderie.* That's the spirit, {{user}}! Let's embark on this epic quest and make the Crystal Caves ours!"
            ),
        ),
    ],
    template: example_dialogue_turn,
};

fn example_dialogue_turn(profile: &PersonaProfile, context: &StageContext) -> String {
    format!(
        concat!(
            "Create a dialogue between {user} and {character}, ",
            "they should have an interesting and engaging conversation, ",
            "with some element of interaction like a handshake, movement, ",
            "or playful gesture. Make it sound natural and dynamic. ",
            "{character} is ",
            "{name}. {name} characteristics: ",
            "{summary}. {personality}. Make this ",
            "character unique and tailor them to the theme of {topic} but ",
            "don't specify what topic it is, and don't describe the ",
            "topic itself. You must match the speaking style to the character, ",
            "if the character is childish then speak in a childish way, if the ",
            "character is serious, philosophical then speak in a serious and ",
            "philosophical way and so on."
        ),
        user = USER,
        character = CHAR,
        name = profile.text(Stage::Name),
        summary = profile.text(Stage::Summary),
        personality = profile.text(Stage::Personality),
        topic = context.topic,
    )
}

static AVATAR_PROMPT: StageSpec = StageSpec {
    stage: Stage::AvatarPrompt,
    system: "You are a text generation tool, in the response you are supposed to give only descriptions of the appearance, what the character looks like, describe the character simply and unambiguously",
    exemplars: &[
        (
            concat!(
                "create a prompt that lists the appearance characteristics of a character whose summary is Jamie Hale is a savvy and accomplished businessman who has carved a name for himself in the world of corporate success. With his sharp mind, impeccable sense of style, and unwavering determination, he has risen to the top of the business world. Jamie stands at 6 feet tall with a confident and commanding presence. He exudes charisma and carries himself with an air of authority that draws people to him.\n",
                "Jamie's appearance is always polished and professional. He is often seen in tailored suits that accentuate his well-maintained physique. His dark, well-groomed hair and neatly trimmed beard add to his refined image. His piercing blue eyes exude a sense of intense focus and ambition. Topic: business"
            ),
            "male, realistic, human, Confident and commanding presence, Polished and professional appearance, tailored suit, Well-maintained physique, Dark well-groomed hair, Neatly trimmed beard, blue eyes",
        ),
        (
            concat!(
                "create a prompt that lists the appearance characteristics of a character whose summary is Yamari stands at a petite, delicate frame with a cascade of raven-black hair flowing down to her waist. A striking purple ribbon adorns her hair, adding an elegant touch to her appearance. Her eyes, large and expressive, are the color of deep amethyst, reflecting a kaleidoscope of emotions and sparkling with curiosity and wonder.\n",
                "Yamari's wardrobe is a colorful and eclectic mix, mirroring her ever-changing moods and the whimsy of her adventures. She often sports a schoolgirl uniform, a cute kimono, or an array of anime-inspired outfits, each tailored to suit the theme of her current escapade. Accessories, such as oversized bows,\n",
                "cat-eared headbands, or a pair of mismatched socks, contribute to her quirky and endearing charm. Topic: anime"
            ),
            "female, anime, Petite and delicate frame, Raven-black hair flowing down to her waist, Striking purple ribbon in her hair, Large and expressive amethyst-colored eyes, Colorful and eclectic outfit, oversized bows, cat-eared headbands, mismatched socks",
        ),
    ],
    template: avatar_prompt_turn,
};

fn avatar_prompt_turn(profile: &PersonaProfile, context: &StageContext) -> String {
    format!(
        concat!(
            "create a prompt that lists the appearance ",
            "characteristics of a character whose summary is ",
            "{summary}. Topic: {topic}"
        ),
        summary = profile.text(Stage::Summary),
        topic = context.topic,
    )
}
